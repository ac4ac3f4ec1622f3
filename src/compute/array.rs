//! Dense array containers for grids, populations and demographic parameters.
//!
//! Both containers are flat `Vec<f64>` buffers. A [`Matrix`] is row-major; a
//! [`Cube`] stores each layer as one contiguous [`Matrix`]-shaped block, so
//! `cube.layer(k)` can be handed to any routine that works on a single field.
//!
//! Axis conventions:
//! - population and environment cubes are (x, y, class/variable)
//! - `alpha` is a (target, source) matrix
//! - `beta`/`gamma` are (target, source, modifier/variable) cubes

use super::SimError;

/// 2D array indexed by (row, col). For spatial fields the row is x.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl Matrix {
    /// Zero-filled matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Matrix filled with a single value.
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Wrap a row-major buffer, checking its length.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, SimError> {
        if data.len() != rows * cols {
            return Err(SimError::shape(
                "matrix buffer",
                format!("{} values ({rows}x{cols})", rows * cols),
                format!("{} values", data.len()),
            ));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from nested rows. Ragged input is rejected.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, SimError> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (r, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(SimError::shape(
                    format!("matrix row {r}"),
                    format!("{cols} columns"),
                    format!("{} columns", row.len()),
                ));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn idx(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        let idx = self.idx(row, col);
        self.data[idx] = value;
    }

    /// Sum of all entries.
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Copy of the sub-block starting at (`row`, `col`).
    pub fn submatrix(&self, row: usize, col: usize, rows: usize, cols: usize) -> Matrix {
        let mut out = Matrix::zeros(rows, cols);
        for r in 0..rows {
            let src = self.idx(row + r, col);
            out.data[r * cols..(r + 1) * cols].copy_from_slice(&self.data[src..src + cols]);
        }
        out
    }
}

/// 3D array indexed by (row, col, layer), layer-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Cube {
    pub rows: usize,
    pub cols: usize,
    pub layers: usize,
    pub data: Vec<f64>,
}

impl Cube {
    /// Zero-filled cube.
    pub fn zeros(rows: usize, cols: usize, layers: usize) -> Self {
        Self {
            rows,
            cols,
            layers,
            data: vec![0.0; rows * cols * layers],
        }
    }

    /// Stack equally-shaped matrices as layers.
    pub fn from_layers(layers: &[Matrix]) -> Result<Self, SimError> {
        let (rows, cols) = layers.first().map_or((0, 0), Matrix::shape);
        let mut data = Vec::with_capacity(rows * cols * layers.len());
        for (k, layer) in layers.iter().enumerate() {
            if layer.shape() != (rows, cols) {
                return Err(SimError::shape(
                    format!("layer {k}"),
                    format!("{rows}x{cols}"),
                    format!("{}x{}", layer.rows, layer.cols),
                ));
            }
            data.extend_from_slice(&layer.data);
        }
        Ok(Self {
            rows,
            cols,
            layers: layers.len(),
            data,
        })
    }

    /// Build from values nested as `[row][col][layer]`, the way parameter
    /// arrays are written in configuration files.
    pub fn from_nested(values: &[Vec<Vec<f64>>]) -> Result<Self, SimError> {
        let rows = values.len();
        let cols = values.first().map_or(0, Vec::len);
        let layers = values
            .first()
            .and_then(|r| r.first())
            .map_or(0, Vec::len);
        let mut cube = Cube::zeros(rows, cols, layers);
        for (r, row) in values.iter().enumerate() {
            if row.len() != cols {
                return Err(SimError::shape(
                    format!("row {r}"),
                    format!("{cols} columns"),
                    format!("{} columns", row.len()),
                ));
            }
            for (c, tube) in row.iter().enumerate() {
                if tube.len() != layers {
                    return Err(SimError::shape(
                        format!("entry ({r}, {c})"),
                        format!("{layers} layers"),
                        format!("{} layers", tube.len()),
                    ));
                }
                for (k, &v) in tube.iter().enumerate() {
                    cube.set(r, c, k, v);
                }
            }
        }
        Ok(cube)
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.rows, self.cols, self.layers)
    }

    /// Number of entries in one layer.
    #[inline]
    pub fn layer_len(&self) -> usize {
        self.rows * self.cols
    }

    #[inline]
    pub fn idx(&self, row: usize, col: usize, layer: usize) -> usize {
        layer * self.rows * self.cols + row * self.cols + col
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize, layer: usize) -> f64 {
        self.data[self.idx(row, col, layer)]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, layer: usize, value: f64) {
        let idx = self.idx(row, col, layer);
        self.data[idx] = value;
    }

    /// Layer `k` as a row-major slice.
    #[inline]
    pub fn layer(&self, k: usize) -> &[f64] {
        let n = self.layer_len();
        &self.data[k * n..(k + 1) * n]
    }

    #[inline]
    pub fn layer_mut(&mut self, k: usize) -> &mut [f64] {
        let n = self.layer_len();
        &mut self.data[k * n..(k + 1) * n]
    }

    /// Copy of layer `k` as a matrix.
    pub fn layer_matrix(&self, k: usize) -> Matrix {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.layer(k).to_vec(),
        }
    }

    /// All values along the layer axis at (`row`, `col`).
    pub fn tube(&self, row: usize, col: usize) -> impl Iterator<Item = f64> + '_ {
        (0..self.layers).map(move |k| self.get(row, col, k))
    }

    /// Sum of all entries.
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Sum of layer `k`.
    pub fn layer_sum(&self, k: usize) -> f64 {
        self.layer(k).iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_from_rows() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m.get(1, 0), 4.0);
        assert_eq!(m.get(0, 2), 3.0);
        assert_eq!(m.sum(), 21.0);
    }

    #[test]
    fn test_matrix_rejects_ragged_rows() {
        let err = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, SimError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_submatrix() {
        let m = Matrix::from_vec(3, 3, (0..9).map(f64::from).collect()).unwrap();
        let sub = m.submatrix(1, 1, 2, 2);
        assert_eq!(sub.data, vec![4.0, 5.0, 7.0, 8.0]);
    }

    #[test]
    fn test_cube_layers_are_contiguous() {
        let a = Matrix::filled(2, 2, 1.0);
        let b = Matrix::filled(2, 2, 2.0);
        let cube = Cube::from_layers(&[a, b]).unwrap();
        assert_eq!(cube.shape(), (2, 2, 2));
        assert_eq!(cube.layer(1), &[2.0, 2.0, 2.0, 2.0]);
        assert_eq!(cube.layer_sum(0), 4.0);
        assert_eq!(cube.tube(1, 1).collect::<Vec<_>>(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_cube_from_nested() {
        let cube = Cube::from_nested(&[
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
            vec![vec![5.0, 6.0], vec![7.0, 8.0]],
        ])
        .unwrap();
        assert_eq!(cube.shape(), (2, 2, 2));
        assert_eq!(cube.get(1, 0, 1), 6.0);
        assert_eq!(cube.get(0, 1, 0), 3.0);
    }
}
