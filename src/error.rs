//! Error types for eigendecomposition-based embeddings.
//!
//! Every strategy reports failures through [`EmbeddingError`]. Caller supplied
//! [`MatrixOperation`](crate::MatrixOperation) implementations speak `anyhow`,
//! their failures are carried through unchanged in [`EmbeddingError::Operation`].
use thiserror::Error;

/// Represents all possible errors of an embedding computation.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Rejected before any solver is invoked.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The method tag does not name one of the known strategies.
    #[error("Unsupported eigendecomposition method: {0:?}")]
    UnsupportedMethod(String),

    /// The requested strategy was not compiled into this build.
    #[error("Eigendecomposition method {method} is not available, enable the `{feature}` feature")]
    FeatureUnavailable {
        method: &'static str,
        feature: &'static str,
    },

    /// The sketched subspace spans fewer directions than requested.
    #[error("Numerically rank deficient subspace: rank {rank} of {requested} requested directions")]
    NumericalDegeneracy { rank: usize, requested: usize },

    /// A dense or iterative eigensolver, or the projection solve, failed.
    #[error("Solver failure: {0}")]
    SolverFailure(String),

    /// The caller supplied matrix operation failed.
    #[error("Matrix operation failed: {0}")]
    Operation(#[from] anyhow::Error),
}

impl EmbeddingError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        EmbeddingError::InvalidArgument(message.into())
    }

    pub(crate) fn solver(message: impl Into<String>) -> Self {
        EmbeddingError::SolverFailure(message.into())
    }
}

pub type Result<T> = std::result::Result<T, EmbeddingError>;
