pub mod dense;
pub mod eigen;
pub mod error;
pub mod matrix;
pub mod sparse;
mod utils;

pub use dense::{DenseInverseMatrixOperation, DenseMatrixOperation};
pub use eigen::{
    eigen_embedding, eigen_embedding_by_name, symmetric_eigen, DenseStrategy, EigenEmbedding,
    EigenEmbeddingBuilder, EigenMethod, EmbeddingResult, EmbeddingStrategy, IterativeStrategy,
    LobpcgConfig, RandomizedStrategy, RankTolerance,
};
pub use error::{EmbeddingError, Result};
pub use matrix::{MatrixOperation, SpectrumEnd, WeightMatrix};
pub use sparse::{SparseInverseMatrixOperation, SparseMatrixOperation};
