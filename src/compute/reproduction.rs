//! Reproductive output across the grid.

use super::error::check_non_negative;
use super::{Cube, Matrix, SimError};

/// Per-cell reproductive output: `Σ_c N_c · fecundity_c`.
///
/// Classes with zero fecundity are skipped.
pub fn reproduce(population: &Cube, fecundity: &[f64]) -> Result<Matrix, SimError> {
    if fecundity.len() != population.layers {
        return Err(SimError::shape(
            "fecundity",
            format!("{} entries (one per class)", population.layers),
            format!("{} entries", fecundity.len()),
        ));
    }
    check_non_negative("fecundity", fecundity)?;

    let mut output = Matrix::zeros(population.rows, population.cols);
    for (class, &f) in fecundity.iter().enumerate() {
        if f == 0.0 {
            continue;
        }
        for (o, &n) in output.data.iter_mut().zip(population.layer(class)) {
            *o += n * f;
        }
    }
    Ok(output)
}
