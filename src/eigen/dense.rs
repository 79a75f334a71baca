use log::debug;
use rand::Rng;

use super::symmetric::symmetric_eigen;
use super::{validate_request, EmbeddingResult, EmbeddingStrategy};
use crate::error::Result;
use crate::matrix::{MatrixOperation, WeightMatrix};
use crate::utils::TimedContext;

/// Full dense eigendecomposition of the weight matrix.
///
/// O(N³) in time and O(N²) in memory, meant for small matrices or as a reference.
/// The operation is only checked for compatibility, the matrix itself is
/// decomposed and eigenpairs `skip..skip + target_dimension` of the ascending
/// spectrum are returned.
///
/// [`MatrixOperation::spectrum_end`] is ignored. With a solve operation this agrees
/// with the other strategies, with a product operation it still returns the
/// smallest eigenpairs where the iterative and randomized strategies return the
/// largest.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseStrategy;

impl EmbeddingStrategy for DenseStrategy {
    fn embed<W, O, R>(
        &self,
        matrix: &W,
        operation: &O,
        target_dimension: usize,
        skip: usize,
        _rng: &mut R,
    ) -> Result<EmbeddingResult>
    where
        W: WeightMatrix + ?Sized,
        O: MatrixOperation + ?Sized,
        R: Rng + ?Sized,
    {
        validate_request(matrix, operation, target_dimension, skip)?;
        let _timer = TimedContext::new("Dense symmetric eigendecomposition");
        debug!(
            "Dense eigendecomposition of a {}x{} matrix",
            matrix.nrows(),
            matrix.ncols()
        );

        let (eigenvalues, eigenvectors) = symmetric_eigen(matrix.to_dense())?;

        Ok(EmbeddingResult::new(
            eigenvectors.columns(skip, target_dimension).into_owned(),
            eigenvalues.rows(skip, target_dimension).into_owned(),
            target_dimension + skip,
            target_dimension + skip,
        ))
    }
}
