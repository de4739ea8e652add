//! Pairwise distances between batches of vectors
//!
//! The squared Euclidean distance between every row of `x` and every row of
//! `y` is computed with the expansion
//!
//! ||x - y||² = ||x||² + ||y||² - 2·xᵀy
//!
//! so the bulk of the work is a single matrix product.

use crate::core::{KernelError, Matrix, MatrixView, Result};
use ndarray::Axis;

/// Check that two batches can be compared
///
/// Both batches need at least one row and one feature, the same number of
/// features, and finite values only.
pub fn validate_batches(x: MatrixView<'_>, y: MatrixView<'_>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(KernelError::EmptyBatch("x has no rows"));
    }
    if y.nrows() == 0 {
        return Err(KernelError::EmptyBatch("y has no rows"));
    }
    if x.ncols() == 0 {
        return Err(KernelError::EmptyBatch("x has no features"));
    }
    if x.ncols() != y.ncols() {
        return Err(KernelError::DimensionMismatch {
            expected: x.ncols(),
            actual: y.ncols(),
        });
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(KernelError::InvalidInput(
            "batches contain NaN or infinite values".to_string(),
        ));
    }
    Ok(())
}

/// Squared Euclidean distance matrix `S[i, j] = ||x_i - y_j||²`
///
/// Entries are clamped at zero since cancellation in the expansion can leave
/// tiny negative values. When `x` and `y` hold the same batch the diagonal is
/// set to exactly zero.
pub fn squared_pairwise_distance(x: MatrixView<'_>, y: MatrixView<'_>) -> Result<Matrix> {
    validate_batches(x, y)?;

    let x_norm_sq = x.map_axis(Axis(1), |row| row.dot(&row));
    let y_norm_sq = y.map_axis(Axis(1), |row| row.dot(&row));

    let mut dist = x.dot(&y.t());
    for ((i, j), d) in dist.indexed_iter_mut() {
        // ||x - y||² = ||x||² + ||y||² - 2*x^T*y
        let squared = x_norm_sq[i] + y_norm_sq[j] - 2.0 * *d;
        *d = squared.max(0.0);
    }

    if x.shape() == y.shape() && x == y {
        dist.diag_mut().fill(0.0);
    }

    Ok(dist)
}
