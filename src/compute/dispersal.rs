//! Spatial dispersal of reproductive output.
//!
//! Seeds from every cell are spread over a `(2r+1) x (2r+1)` window of a grid
//! padded by `r` on each side. With a reflecting boundary the padding is folded
//! back onto the interior; with an absorbing boundary it is dropped.

use rand::Rng;

use super::error::check_non_negative;
use super::fft::FftDispersal;
use super::rng::{binomial, check_counts, seeded_rng};
use super::{Matrix, Neighborhood, SimError};
use crate::schema::{Boundary, DispersalBackend, Mode};

/// Kernel side length from which `DispersalBackend::Auto` switches to FFT.
pub const AUTO_FFT_MIN_SIZE: usize = 15;

/// Disperse `seeds` with a generator seeded from `seed`.
pub fn disperse(
    seeds: &Matrix,
    kernel: &Neighborhood,
    boundary: Boundary,
    mode: Mode,
    seed: u64,
) -> Result<Matrix, SimError> {
    let mut rng = seeded_rng(seed);
    disperse_with_rng(seeds, kernel, boundary, mode, &mut rng)
}

/// Disperse `seeds`, drawing from `rng` in stochastic mode.
///
/// Returns a field of the same shape as `seeds`.
pub fn disperse_with_rng<R: Rng + ?Sized>(
    seeds: &Matrix,
    kernel: &Neighborhood,
    boundary: Boundary,
    mode: Mode,
    rng: &mut R,
) -> Result<Matrix, SimError> {
    check_seeds(seeds, mode)?;
    let padded = match mode {
        Mode::Deterministic => spread_expected(seeds, kernel),
        Mode::Stochastic => spread_sampled(seeds, kernel, rng),
    };
    Ok(finish(padded, kernel.radius(), seeds.shape(), boundary))
}

/// Dispersal with a fixed kernel and grid, reusing FFT plans across calls.
pub struct Disperser {
    kernel: Neighborhood,
    fft: Option<FftDispersal>,
}

impl Disperser {
    /// Prepare dispersal of `rows x cols` seed fields.
    pub fn new(kernel: Neighborhood, rows: usize, cols: usize, backend: DispersalBackend) -> Self {
        let use_fft = match backend {
            DispersalBackend::Direct => false,
            DispersalBackend::Fft => true,
            DispersalBackend::Auto => kernel.size() >= AUTO_FFT_MIN_SIZE,
        };
        let fft = use_fft.then(|| FftDispersal::new(&kernel, rows, cols));
        Self { kernel, fft }
    }

    pub fn kernel(&self) -> &Neighborhood {
        &self.kernel
    }

    /// True when expected dispersal goes through the FFT path.
    pub fn uses_fft(&self) -> bool {
        self.fft.is_some()
    }

    pub fn disperse<R: Rng + ?Sized>(
        &self,
        seeds: &Matrix,
        boundary: Boundary,
        mode: Mode,
        rng: &mut R,
    ) -> Result<Matrix, SimError> {
        match (&self.fft, mode) {
            (Some(fft), Mode::Deterministic) => {
                if fft.seed_shape() != seeds.shape() {
                    let (rows, cols) = fft.seed_shape();
                    return Err(SimError::shape(
                        "seed field",
                        format!("{rows}x{cols}"),
                        format!("{}x{}", seeds.rows, seeds.cols),
                    ));
                }
                check_seeds(seeds, mode)?;
                let padded = fft.spread(seeds);
                Ok(finish(padded, self.kernel.radius(), seeds.shape(), boundary))
            }
            _ => disperse_with_rng(seeds, &self.kernel, boundary, mode, rng),
        }
    }
}

fn check_seeds(seeds: &Matrix, mode: Mode) -> Result<(), SimError> {
    check_non_negative("seed field", &seeds.data)?;
    if mode.is_stochastic() {
        check_counts("seed field", &seeds.data)?;
    }
    Ok(())
}

fn finish(mut padded: Matrix, radius: usize, shape: (usize, usize), boundary: Boundary) -> Matrix {
    if boundary == Boundary::Reflecting {
        reflect_borders(&mut padded, radius);
    }
    padded.submatrix(radius, radius, shape.0, shape.1)
}

/// Add `S(a,b) · K` to the window around every source cell.
fn spread_expected(seeds: &Matrix, kernel: &Neighborhood) -> Matrix {
    let size = kernel.size();
    let radius = kernel.radius();
    let mut padded = Matrix::zeros(seeds.rows + 2 * radius, seeds.cols + 2 * radius);
    let pcols = padded.cols;

    for a in 0..seeds.rows {
        for b in 0..seeds.cols {
            let s = seeds.get(a, b);
            if s == 0.0 {
                continue;
            }
            for i in 0..size {
                let row = (a + i) * pcols + b;
                for j in 0..size {
                    padded.data[row + j] += s * kernel.get(i, j);
                }
            }
        }
    }

    padded
}

/// Sequentially split each cell's seed count across kernel offsets.
///
/// Offsets are visited from heaviest to lightest. Each draw is binomial over
/// the still-unallocated seeds with the offset's weight renormalized against
/// the unvisited weight, so a kernel with positive total places every seed.
fn spread_sampled<R: Rng + ?Sized>(seeds: &Matrix, kernel: &Neighborhood, rng: &mut R) -> Matrix {
    let size = kernel.size();
    let radius = kernel.radius();
    let mut padded = Matrix::zeros(seeds.rows + 2 * radius, seeds.cols + 2 * radius);
    let pcols = padded.cols;
    let weights = kernel.data();

    for a in 0..seeds.rows {
        for b in 0..seeds.cols {
            let mut unallocated = seeds.get(a, b).floor() as u64;
            if unallocated == 0 {
                continue;
            }
            for (k, &offset) in kernel.visit_order().iter().enumerate() {
                let remaining = kernel.remaining_weight(k);
                if remaining <= 0.0 {
                    break;
                }
                let drawn = binomial(rng, unallocated, weights[offset] / remaining);
                let (i, j) = (offset / size, offset % size);
                padded.data[(a + i) * pcols + b + j] += drawn as f64;
                unallocated -= drawn;
                if unallocated == 0 {
                    break;
                }
            }
        }
    }

    padded
}

/// Fold the `radius` border layers back onto the interior.
///
/// Layer `i` from an edge is added to layer `2r - 1 - i`, top, left, bottom
/// and right in turn for each `i`. Targets that are themselves padding on the
/// far side get folded again at a later `i`, so narrow grids still conserve.
fn reflect_borders(padded: &mut Matrix, radius: usize) {
    let (rows, cols) = padded.shape();
    for i in 0..radius {
        let mirror = 2 * radius - 1 - i;
        add_row(padded, i, mirror);
        add_col(padded, i, mirror);
        add_row(padded, rows - 1 - i, rows - 1 - mirror);
        add_col(padded, cols - 1 - i, cols - 1 - mirror);
    }
}

fn add_row(m: &mut Matrix, from: usize, to: usize) {
    let cols = m.cols;
    for c in 0..cols {
        m.data[to * cols + c] += m.data[from * cols + c];
    }
}

fn add_col(m: &mut Matrix, from: usize, to: usize) {
    let cols = m.cols;
    for r in 0..m.rows {
        m.data[r * cols + to] += m.data[r * cols + from];
    }
}
