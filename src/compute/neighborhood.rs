//! Dispersal neighborhood kernels.
//!
//! A neighborhood is a square matrix of odd side `2r + 1` holding the
//! probability that an offspring lands at each offset from its parent cell.
//! The centre entry is the probability of staying put.

use super::error::check_non_negative;
use super::{Matrix, SimError};

/// Slack allowed when checking that a kernel sums to at most 1.
const TOTAL_TOLERANCE: f64 = 1e-9;

/// Validated dispersal kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighborhood {
    /// Kernel weights, row-major (row offset = x, col offset = y).
    data: Vec<f64>,
    /// Side length (`2 * radius + 1`).
    size: usize,
    /// Offsets in descending weight, ties in scan order.
    visit_order: Vec<usize>,
    /// `tail[k]`: total weight of `visit_order[k..]`.
    tail: Vec<f64>,
}

impl Neighborhood {
    /// Build from nested rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, SimError> {
        Self::from_matrix(&Matrix::from_rows(rows)?)
    }

    /// Build from a matrix, checking it is square, odd-sided, non-negative
    /// and sums to at most 1.
    pub fn from_matrix(matrix: &Matrix) -> Result<Self, SimError> {
        let (rows, cols) = matrix.shape();
        if rows != cols || rows % 2 == 0 {
            return Err(SimError::shape(
                "neighborhood kernel",
                "square matrix with odd side length",
                format!("{rows}x{cols}"),
            ));
        }
        check_non_negative("neighborhood kernel", &matrix.data)?;

        let total: f64 = matrix.data.iter().sum();
        if total > 1.0 + TOTAL_TOLERANCE {
            return Err(SimError::invalid(
                "neighborhood kernel",
                format!("weights sum to {total}, more than 1"),
            ));
        }
        if total == 0.0 {
            log::warn!("neighborhood kernel has zero total weight; all offspring are lost");
        }

        let mut visit_order: Vec<usize> = (0..matrix.data.len()).collect();
        // stable: equal weights keep scan order
        visit_order.sort_by(|&a, &b| matrix.data[b].total_cmp(&matrix.data[a]));

        let mut tail = vec![0.0; visit_order.len()];
        let mut acc = 0.0;
        for k in (0..visit_order.len()).rev() {
            acc += matrix.data[visit_order[k]];
            tail[k] = acc;
        }

        Ok(Self {
            data: matrix.data.clone(),
            size: rows,
            visit_order,
            tail,
        })
    }

    /// Single-cell kernel that keeps every offspring in place.
    pub fn stay() -> Self {
        Self {
            data: vec![1.0],
            size: 1,
            visit_order: vec![0],
            tail: vec![1.0],
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn radius(&self) -> usize {
        (self.size - 1) / 2
    }

    /// Weight at (row offset, col offset), centre at (radius, radius).
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.size + col]
    }

    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Total weight. Below 1 means some offspring are lost in expectation.
    pub fn total(&self) -> f64 {
        self.tail.first().copied().unwrap_or(0.0)
    }

    /// Flat offsets in the order sequential allocation visits them.
    #[inline]
    pub fn visit_order(&self) -> &[usize] {
        &self.visit_order
    }

    /// Weight still unvisited when allocation reaches `visit_order()[k]`.
    #[inline]
    pub fn remaining_weight(&self, k: usize) -> f64 {
        self.tail[k]
    }

    /// Zero-padded copy with the kernel in the top-left corner, for FFT
    /// convolution on a `rows x cols` grid.
    pub fn pad_to_size(&self, rows: usize, cols: usize) -> Vec<f64> {
        let mut padded = vec![0.0; rows * cols];
        for r in 0..self.size.min(rows) {
            for c in 0..self.size.min(cols) {
                padded[r * cols + c] = self.get(r, c);
            }
        }
        padded
    }

    /// Copy of the weights as a matrix.
    pub fn to_matrix(&self) -> Matrix {
        Matrix {
            rows: self.size,
            cols: self.size,
            data: self.data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plus_kernel() -> Neighborhood {
        Neighborhood::from_rows(&[
            vec![0.0, 0.1, 0.0],
            vec![0.1, 0.6, 0.1],
            vec![0.0, 0.1, 0.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_radius_and_total() {
        let k = plus_kernel();
        assert_eq!(k.size(), 3);
        assert_eq!(k.radius(), 1);
        assert!((k.total() - 1.0).abs() < 1e-12);
        assert_eq!(k.get(1, 1), 0.6);
    }

    #[test]
    fn test_visit_order_descending_with_stable_ties() {
        let k = plus_kernel();
        assert_eq!(&k.visit_order()[..5], &[4, 1, 3, 5, 7]);
        assert!((k.remaining_weight(1) - 0.4).abs() < 1e-12);
        assert_eq!(k.remaining_weight(4), k.get(2, 1));
        assert_eq!(k.remaining_weight(5), 0.0);
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(matches!(
            Neighborhood::from_rows(&[vec![0.5, 0.5], vec![0.0, 0.0]]),
            Err(SimError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            Neighborhood::from_rows(&[vec![0.2, 0.2, 0.2]]),
            Err(SimError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_weights() {
        assert!(matches!(
            Neighborhood::from_rows(&[vec![-0.1]]),
            Err(SimError::InvalidParameter { .. })
        ));
        assert!(matches!(
            Neighborhood::from_rows(&[
                vec![0.2, 0.2, 0.2],
                vec![0.2, 0.2, 0.2],
                vec![0.2, 0.2, 0.2],
            ]),
            Err(SimError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_pad_to_size() {
        let k = plus_kernel();
        let padded = k.pad_to_size(4, 5);
        assert_eq!(padded.len(), 20);
        assert_eq!(padded[5 + 1], 0.6);
        assert_eq!(padded[4], 0.0);
        let total: f64 = padded.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
    }
}
