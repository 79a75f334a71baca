//! Full eigendecomposition of small dense symmetric matrices.
//!
//! Uses nalgebra's `SymmetricEigen` by default and LAPACK (`dsyev`) when the
//! `lapack` feature is enabled. Either way the result is sorted ascending.

use nalgebra::{DMatrix, DVector};

use crate::error::{EmbeddingError, Result};
use crate::utils::ascending_order;

#[cfg(not(feature = "lapack"))]
const MAX_SWEEPS_PER_EIGENVALUE: usize = 1000;

/// Eigendecomposes a symmetric matrix, returning `(eigenvalues, eigenvectors)` with
/// eigenvalues ascending and eigenvector `j` stored in column `j`.
pub fn symmetric_eigen(matrix: DMatrix<f64>) -> Result<(DVector<f64>, DMatrix<f64>)> {
    let (nrows, ncols) = matrix.shape();
    if nrows != ncols {
        return Err(EmbeddingError::invalid(format!(
            "Cannot eigendecompose a non-square {}x{} matrix",
            nrows, ncols
        )));
    }
    if nrows == 0 {
        return Ok((DVector::zeros(0), DMatrix::zeros(0, 0)));
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(EmbeddingError::solver(
            "Matrix to eigendecompose contains non-finite values",
        ));
    }

    let (eigenvalues, eigenvectors) = decompose(matrix)?;

    let order = ascending_order(eigenvalues.as_slice());
    let sorted_values = DVector::from_fn(nrows, |i, _| eigenvalues[order[i]]);
    let sorted_vectors = DMatrix::from_fn(nrows, nrows, |i, j| eigenvectors[(i, order[j])]);
    Ok((sorted_values, sorted_vectors))
}

#[cfg(not(feature = "lapack"))]
fn decompose(matrix: DMatrix<f64>) -> Result<(DVector<f64>, DMatrix<f64>)> {
    let max_iterations = MAX_SWEEPS_PER_EIGENVALUE * matrix.nrows();
    let eigen = nalgebra::SymmetricEigen::try_new(matrix, f64::EPSILON, max_iterations)
        .ok_or_else(|| EmbeddingError::solver("Symmetric eigendecomposition did not converge"))?;
    Ok((eigen.eigenvalues, eigen.eigenvectors))
}

#[cfg(feature = "lapack")]
fn decompose(matrix: DMatrix<f64>) -> Result<(DVector<f64>, DMatrix<f64>)> {
    let eigen = nalgebra_lapack::SymmetricEigen::try_new(matrix)
        .ok_or_else(|| EmbeddingError::solver("LAPACK symmetric eigendecomposition failed"))?;
    Ok((eigen.eigenvalues, eigen.eigenvectors))
}
