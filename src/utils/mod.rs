//! Helpers for working with kernel matrices

use crate::core::{KernelError, Matrix, MatrixView, Result};
use ndarray::Axis;

/// Copy of a square matrix with its diagonal set to zero
///
/// Unbiased MMD estimates drop the k(x_i, x_i) terms this way.
pub fn zero_diag(mat: MatrixView<'_>) -> Result<Matrix> {
    if mat.nrows() != mat.ncols() {
        return Err(KernelError::ShapeMismatch(format!(
            "zero_diag needs a square matrix, got {:?}",
            mat.dim()
        )));
    }
    let mut out = mat.to_owned();
    out.diag_mut().fill(0.0);
    Ok(out)
}

/// Sub-matrix made of the given rows and columns, in the given order
///
/// Used to split a joint kernel matrix over `[x; y]` into its K_xx, K_yy and
/// K_xy blocks after permuting instances.
pub fn subset_matrix(mat: MatrixView<'_>, rows: &[usize], cols: &[usize]) -> Result<Matrix> {
    let (n, m) = mat.dim();
    if let Some(&i) = rows.iter().find(|&&i| i >= n) {
        return Err(KernelError::InvalidInput(format!(
            "row index {i} out of bounds for {n} rows"
        )));
    }
    if let Some(&j) = cols.iter().find(|&&j| j >= m) {
        return Err(KernelError::InvalidInput(format!(
            "column index {j} out of bounds for {m} columns"
        )));
    }
    Ok(mat.select(Axis(0), rows).select(Axis(1), cols))
}

/// Whether a square matrix equals its transpose within `tol`
pub fn is_symmetric(mat: MatrixView<'_>, tol: f64) -> bool {
    mat.nrows() == mat.ncols()
        && mat
            .indexed_iter()
            .all(|((i, j), v)| (v - mat[[j, i]]).abs() <= tol)
}
