//! FFT-based expected dispersal for large kernels.
//!
//! Expected dispersal is a full linear convolution of the seed field with the
//! kernel. Zero-padding the seed field by the kernel radius on every side makes
//! the circular convolution on the padded grid identical to the linear one,
//! so the result lines up with the padded buffer of the direct method.

use std::sync::Arc;

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::{Matrix, Neighborhood};

/// Kernel transform and FFT plans for one padded grid size.
pub struct FftDispersal {
    rows: usize,
    cols: usize,
    radius: usize,
    kernel_freq: Vec<Complex<f64>>,
    fft_row: Arc<dyn Fft<f64>>,
    fft_col: Arc<dyn Fft<f64>>,
    ifft_row: Arc<dyn Fft<f64>>,
    ifft_col: Arc<dyn Fft<f64>>,
}

impl FftDispersal {
    /// Plan transforms for seed fields of `seed_rows x seed_cols`.
    pub fn new(kernel: &Neighborhood, seed_rows: usize, seed_cols: usize) -> Self {
        let radius = kernel.radius();
        let rows = seed_rows + 2 * radius;
        let cols = seed_cols + 2 * radius;

        let mut planner = FftPlanner::new();
        let fft_row = planner.plan_fft_forward(cols);
        let fft_col = planner.plan_fft_forward(rows);
        let ifft_row = planner.plan_fft_inverse(cols);
        let ifft_col = planner.plan_fft_inverse(rows);

        let mut this = Self {
            rows,
            cols,
            radius,
            kernel_freq: Vec::new(),
            fft_row,
            fft_col,
            ifft_row,
            ifft_col,
        };
        this.kernel_freq = this.fft2d(&kernel.pad_to_size(rows, cols));
        this
    }

    /// Seed-field shape these plans were built for.
    pub fn seed_shape(&self) -> (usize, usize) {
        (self.rows - 2 * self.radius, self.cols - 2 * self.radius)
    }

    /// Spread `seeds` into a padded `(rows + 2r) x (cols + 2r)` buffer.
    ///
    /// Round-off below zero is clipped.
    pub fn spread(&self, seeds: &Matrix) -> Matrix {
        let mut input = vec![0.0; self.rows * self.cols];
        for r in 0..seeds.rows {
            let dst = r * self.cols;
            input[dst..dst + seeds.cols]
                .copy_from_slice(&seeds.data[r * seeds.cols..(r + 1) * seeds.cols]);
        }

        let mut freq = self.fft2d(&input);
        for (a, &k) in freq.iter_mut().zip(&self.kernel_freq) {
            *a *= k;
        }
        let data = self
            .ifft2d(&mut freq)
            .into_iter()
            .map(|v| v.max(0.0))
            .collect();

        Matrix {
            rows: self.rows,
            cols: self.cols,
            data,
        }
    }

    fn fft2d(&self, input: &[f64]) -> Vec<Complex<f64>> {
        let mut data: Vec<Complex<f64>> = input.iter().map(|&x| Complex::new(x, 0.0)).collect();

        for row in data.chunks_exact_mut(self.cols) {
            self.fft_row.process(row);
        }

        let mut col_buffer = vec![Complex::new(0.0, 0.0); self.rows];
        for c in 0..self.cols {
            for r in 0..self.rows {
                col_buffer[r] = data[r * self.cols + c];
            }
            self.fft_col.process(&mut col_buffer);
            for r in 0..self.rows {
                data[r * self.cols + c] = col_buffer[r];
            }
        }

        data
    }

    fn ifft2d(&self, input: &mut [Complex<f64>]) -> Vec<f64> {
        let mut col_buffer = vec![Complex::new(0.0, 0.0); self.rows];
        for c in 0..self.cols {
            for r in 0..self.rows {
                col_buffer[r] = input[r * self.cols + c];
            }
            self.ifft_col.process(&mut col_buffer);
            for r in 0..self.rows {
                input[r * self.cols + c] = col_buffer[r];
            }
        }

        for row in input.chunks_exact_mut(self.cols) {
            self.ifft_row.process(row);
        }

        let scale = 1.0 / (self.rows * self.cols) as f64;
        input.iter().map(|c| c.re * scale).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_kernel(radius: usize) -> Neighborhood {
        let size = 2 * radius + 1;
        let mut rows = vec![vec![0.0; size]; size];
        let mut total = 0.0;
        for (i, row) in rows.iter_mut().enumerate() {
            for (j, w) in row.iter_mut().enumerate() {
                let d = ((i as f64 - radius as f64).powi(2) + (j as f64 - radius as f64).powi(2))
                    .sqrt();
                *w = (-d / 2.0).exp();
                total += *w;
            }
        }
        for row in &mut rows {
            for w in row.iter_mut() {
                *w /= total;
            }
        }
        Neighborhood::from_rows(&rows).unwrap()
    }

    #[test]
    fn test_delta_seed_reproduces_kernel() {
        let kernel = ring_kernel(2);
        let fft = FftDispersal::new(&kernel, 5, 6);
        assert_eq!(fft.seed_shape(), (5, 6));

        let mut seeds = Matrix::zeros(5, 6);
        seeds.set(1, 3, 10.0);
        let padded = fft.spread(&seeds);
        assert_eq!(padded.shape(), (9, 10));

        for i in 0..5 {
            for j in 0..5 {
                let got = padded.get(1 + i, 3 + j);
                assert!(
                    (got - 10.0 * kernel.get(i, j)).abs() < 1e-9,
                    "offset ({i}, {j}): {got}"
                );
            }
        }
        assert!((padded.sum() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_wraparound_at_corners() {
        let kernel = ring_kernel(3);
        let fft = FftDispersal::new(&kernel, 4, 4);
        let mut seeds = Matrix::zeros(4, 4);
        seeds.set(3, 3, 1.0);
        let padded = fft.spread(&seeds);
        // Nothing lands up-left of the source window.
        for r in 0..3 {
            for c in 0..padded.cols {
                assert!(padded.get(r, c).abs() < 1e-12);
            }
        }
    }
}
