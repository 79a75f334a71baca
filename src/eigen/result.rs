use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};
use nshare::IntoNdarray2;

use crate::error::{EmbeddingError, Result};

/// Embedding coordinates and their eigenvalues, as produced by every strategy.
///
/// Column `j` of the embedding is the eigenvector belonging to eigenvalue `j`,
/// eigenvalues ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResult {
    embedding: DMatrix<f64>,
    eigenvalues: DVector<f64>,
    rank: usize,
    requested_rank: usize,
}

impl EmbeddingResult {
    pub(crate) fn new(
        embedding: DMatrix<f64>,
        eigenvalues: DVector<f64>,
        rank: usize,
        requested_rank: usize,
    ) -> Self {
        EmbeddingResult {
            embedding,
            eigenvalues,
            rank,
            requested_rank,
        }
    }

    /// N×target_dimension embedding matrix.
    pub fn embedding(&self) -> &DMatrix<f64> {
        &self.embedding
    }

    pub fn eigenvalues(&self) -> &DVector<f64> {
        &self.eigenvalues
    }

    /// Number of independent directions the strategy actually found. Equal to
    /// [`requested_rank`](Self::requested_rank) except for a rank deficient
    /// randomized sketch.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// `target_dimension + skip`.
    pub fn requested_rank(&self) -> usize {
        self.requested_rank
    }

    /// Whether trailing eigenpairs are numerically meaningless.
    pub fn is_degenerate(&self) -> bool {
        self.rank < self.requested_rank
    }

    /// Turns a degenerate result into [`EmbeddingError::NumericalDegeneracy`].
    pub fn ensure_full_rank(&self) -> Result<()> {
        if self.is_degenerate() {
            return Err(EmbeddingError::NumericalDegeneracy {
                rank: self.rank,
                requested: self.requested_rank,
            });
        }
        Ok(())
    }

    pub fn into_parts(self) -> (DMatrix<f64>, DVector<f64>) {
        (self.embedding, self.eigenvalues)
    }

    /// Converts the embedding and eigenvalues into ndarray containers.
    pub fn into_ndarray(self) -> (Array2<f64>, Array1<f64>) {
        let eigenvalues = Array1::from(self.eigenvalues.as_slice().to_vec());
        let embedding = self.embedding.into_ndarray2().into_owned();
        (embedding, eigenvalues)
    }
}
