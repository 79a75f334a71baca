//! # Eigendecomposition-based embeddings
//!
//! Computes `target_dimension` eigenpairs of a symmetric weight matrix after
//! discarding `skip` eigenpairs, eigenvalues ascending. Three strategies share one
//! interface:
//!
//! - **Iterative** ([`IterativeStrategy`]): LOBPCG on the matrix operation, for
//!   large sparse matrices. Requires the `lobpcg` feature.
//! - **Dense** ([`DenseStrategy`]): full dense eigendecomposition, exact but O(N³).
//! - **Randomized** ([`RandomizedStrategy`]): range finding with a random sketch and a
//!   Rayleigh-Ritz projection, approximate and cheap.
//!
//! The strategies are interchangeable for solve operations, where all three return
//! the smallest eigenpairs. For product operations Iterative and Randomized return
//! the largest eigenpairs, while Dense ignores the operation and always slices the
//! ascending spectrum from its smallest end.
//!
//! Use [`eigen_embedding`] to dispatch on an [`EigenMethod`] with default settings,
//! or [`EigenEmbeddingBuilder`] to configure seeds and tolerances.

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use log::debug;
use nalgebra::DMatrix;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{EmbeddingError, Result};
use crate::matrix::{MatrixOperation, WeightMatrix};

mod dense;
mod iterative;
#[cfg(feature = "lobpcg")]
mod lobpcg;
mod randomized;
mod result;
mod symmetric;

pub use dense::DenseStrategy;
pub use iterative::{IterativeStrategy, LobpcgConfig};
pub use randomized::{RandomizedStrategy, RankTolerance, DEFAULT_RANK_TOLERANCE};
pub use result::EmbeddingResult;
pub use symmetric::symmetric_eigen;

/// The eigendecomposition strategy to run.
///
/// Dense always returns eigenpairs counted from the smallest eigenvalue. Iterative
/// and Randomized follow [`MatrixOperation::spectrum_end`], so with a product
/// operation they return the largest eigenpairs instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EigenMethod {
    Iterative,
    Dense,
    Randomized,
}

impl EigenMethod {
    pub const ALL: [EigenMethod; 3] = [
        EigenMethod::Iterative,
        EigenMethod::Dense,
        EigenMethod::Randomized,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EigenMethod::Iterative => "Iterative",
            EigenMethod::Dense => "Dense",
            EigenMethod::Randomized => "Randomized",
        }
    }

    /// Whether the method can run in this build.
    pub fn is_available(&self) -> bool {
        match self {
            EigenMethod::Iterative => IterativeStrategy::is_available(),
            EigenMethod::Dense | EigenMethod::Randomized => true,
        }
    }
}

impl Default for EigenMethod {
    fn default() -> Self {
        if IterativeStrategy::is_available() {
            EigenMethod::Iterative
        } else {
            EigenMethod::Dense
        }
    }
}

impl fmt::Display for EigenMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EigenMethod {
    type Err = EmbeddingError;

    fn from_str(tag: &str) -> Result<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "iterative" | "lobpcg" | "arpack" => Ok(EigenMethod::Iterative),
            "dense" | "eigen_dense_selfadjoint_solver" => Ok(EigenMethod::Dense),
            "randomized" | "random" => Ok(EigenMethod::Randomized),
            _ => Err(EmbeddingError::UnsupportedMethod(tag.to_string())),
        }
    }
}

/// A strategy computing an eigen-embedding of a weight matrix.
pub trait EmbeddingStrategy {
    /// Computes `target_dimension` eigenpairs after skipping `skip` of them.
    ///
    /// `rng` feeds the random start vectors and sketches, strategies without a
    /// random component ignore it.
    fn embed<W, O, R>(
        &self,
        matrix: &W,
        operation: &O,
        target_dimension: usize,
        skip: usize,
        rng: &mut R,
    ) -> Result<EmbeddingResult>
    where
        W: WeightMatrix + ?Sized,
        O: MatrixOperation + ?Sized,
        R: Rng + ?Sized;
}

/// Runs the strategy selected by `method` with its default settings.
pub fn eigen_embedding<W, O, R>(
    method: EigenMethod,
    matrix: &W,
    operation: &O,
    target_dimension: usize,
    skip: usize,
    rng: &mut R,
) -> Result<EmbeddingResult>
where
    W: WeightMatrix + ?Sized,
    O: MatrixOperation + ?Sized,
    R: Rng + ?Sized,
{
    debug!(
        "{} eigen-embedding, target dimension {}, skip {}",
        method, target_dimension, skip
    );
    match method {
        EigenMethod::Iterative => {
            IterativeStrategy::default().embed(matrix, operation, target_dimension, skip, rng)
        }
        EigenMethod::Dense => DenseStrategy.embed(matrix, operation, target_dimension, skip, rng),
        EigenMethod::Randomized => {
            RandomizedStrategy::default().embed(matrix, operation, target_dimension, skip, rng)
        }
    }
}

/// Same as [`eigen_embedding`] with the method given by name, e.g. from a
/// command line or a configuration value.
pub fn eigen_embedding_by_name<W, O, R>(
    method: &str,
    matrix: &W,
    operation: &O,
    target_dimension: usize,
    skip: usize,
    rng: &mut R,
) -> Result<EmbeddingResult>
where
    W: WeightMatrix + ?Sized,
    O: MatrixOperation + ?Sized,
    R: Rng + ?Sized,
{
    let method: EigenMethod = method.parse()?;
    eigen_embedding(method, matrix, operation, target_dimension, skip, rng)
}

/// Rejects requests no strategy can serve, before any computation.
pub(crate) fn validate_request<W, O>(
    matrix: &W,
    operation: &O,
    target_dimension: usize,
    skip: usize,
) -> Result<()>
where
    W: WeightMatrix + ?Sized,
    O: MatrixOperation + ?Sized,
{
    if !matrix.is_square() {
        return Err(EmbeddingError::invalid(format!(
            "Weight matrix must be square, got {}x{}",
            matrix.nrows(),
            matrix.ncols()
        )));
    }
    let n = matrix.ncols();
    if operation.dim() != n {
        return Err(EmbeddingError::invalid(format!(
            "Operation is bound to a matrix of order {} but the weight matrix has order {}",
            operation.dim(),
            n
        )));
    }
    if target_dimension == 0 {
        return Err(EmbeddingError::invalid("Target dimension must be positive"));
    }
    match target_dimension.checked_add(skip) {
        Some(requested) if requested <= n => Ok(()),
        _ => Err(EmbeddingError::invalid(format!(
            "Target dimension {} plus skip {} exceeds the matrix order {}",
            target_dimension, skip, n
        ))),
    }
}

/// Checks a block returned by an operation for shape and finiteness.
pub(crate) fn check_block(block: &DMatrix<f64>, rows: usize, cols: usize, what: &str) -> Result<()> {
    if block.shape() != (rows, cols) {
        return Err(EmbeddingError::Operation(anyhow!(
            "Operation returned a {}x{} {} where {}x{} was expected",
            block.nrows(),
            block.ncols(),
            what,
            rows,
            cols
        )));
    }
    if block.iter().any(|v| !v.is_finite()) {
        return Err(EmbeddingError::solver(format!(
            "Operation produced non-finite values in the {}",
            what
        )));
    }
    Ok(())
}

/// A configured eigen-embedding.
///
/// Holds the method, dimensions and solver settings. Each call to
/// [`embed`](Self::embed) seeds its own random stream, so repeated calls and calls
/// from different threads are reproducible and independent.
#[derive(Debug, Clone)]
pub struct EigenEmbedding {
    method: EigenMethod,
    target_dimension: usize,
    skip: usize,
    random_seed: u64,
    rank_tolerance: RankTolerance,
    lobpcg: LobpcgConfig,
}

impl EigenEmbedding {
    pub fn builder() -> EigenEmbeddingBuilder {
        EigenEmbeddingBuilder::new()
    }

    /// Runs the configured strategy with a stream seeded from `random_seed`.
    pub fn embed<W, O>(&self, matrix: &W, operation: &O) -> Result<EmbeddingResult>
    where
        W: WeightMatrix + ?Sized,
        O: MatrixOperation + ?Sized,
    {
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_seed);
        self.embed_with_rng(matrix, operation, &mut rng)
    }

    /// Runs the configured strategy drawing randomness from `rng`.
    pub fn embed_with_rng<W, O, R>(
        &self,
        matrix: &W,
        operation: &O,
        rng: &mut R,
    ) -> Result<EmbeddingResult>
    where
        W: WeightMatrix + ?Sized,
        O: MatrixOperation + ?Sized,
        R: Rng + ?Sized,
    {
        debug!(
            "{} eigen-embedding, target dimension {}, skip {}, seed {}",
            self.method, self.target_dimension, self.skip, self.random_seed
        );
        match self.method {
            EigenMethod::Iterative => IterativeStrategy::new(self.lobpcg).embed(
                matrix,
                operation,
                self.target_dimension,
                self.skip,
                rng,
            ),
            EigenMethod::Dense => {
                DenseStrategy.embed(matrix, operation, self.target_dimension, self.skip, rng)
            }
            EigenMethod::Randomized => RandomizedStrategy::new(self.rank_tolerance).embed(
                matrix,
                operation,
                self.target_dimension,
                self.skip,
                rng,
            ),
        }
    }

    pub fn method(&self) -> EigenMethod {
        self.method
    }

    pub fn target_dimension(&self) -> usize {
        self.target_dimension
    }

    pub fn skip(&self) -> usize {
        self.skip
    }

    pub fn random_seed(&self) -> u64 {
        self.random_seed
    }

    pub fn rank_tolerance(&self) -> RankTolerance {
        self.rank_tolerance
    }

    pub fn lobpcg_config(&self) -> &LobpcgConfig {
        &self.lobpcg
    }
}

/// Builder for configuring and creating [`EigenEmbedding`] instances.
///
/// # Example Usage
/// ```ignore
/// let embedding = EigenEmbeddingBuilder::new()
///     .method(EigenMethod::Randomized)
///     .target_dimension(2)
///     .skip(1)
///     .random_seed(7)
///     .build();
/// let result = embedding.embed(&matrix, &DenseMatrixOperation::new(&matrix))?;
/// ```
#[derive(Debug, Clone)]
pub struct EigenEmbeddingBuilder {
    method: EigenMethod,
    target_dimension: usize,
    skip: usize,
    random_seed: u64,
    rank_tolerance: RankTolerance,
    lobpcg: LobpcgConfig,
}

impl Default for EigenEmbeddingBuilder {
    fn default() -> Self {
        Self {
            method: EigenMethod::default(),
            target_dimension: 2,
            skip: 0,
            random_seed: 42,
            rank_tolerance: RankTolerance::default(),
            lobpcg: LobpcgConfig::default(),
        }
    }
}

impl EigenEmbeddingBuilder {
    /// Creates a new builder with default parameters.
    ///
    /// Default values:
    /// - `method`: Iterative (Dense without the `lobpcg` feature)
    /// - `target_dimension`: 2
    /// - `skip`: 0
    /// - `random_seed`: 42
    /// - `rank_tolerance`: absolute 1e-4
    /// - `lobpcg`: relative tolerance 1e-6, at most 1000 iterations
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: EigenMethod) -> Self {
        self.method = method;
        self
    }

    pub fn target_dimension(mut self, target_dimension: usize) -> Self {
        self.target_dimension = target_dimension;
        self
    }

    /// Number of eigenpairs at the unwanted end of the spectrum to discard.
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Rank threshold used by the randomized strategy.
    pub fn rank_tolerance(mut self, rank_tolerance: RankTolerance) -> Self {
        self.rank_tolerance = rank_tolerance;
        self
    }

    pub fn lobpcg(mut self, config: LobpcgConfig) -> Self {
        self.lobpcg = config;
        self
    }

    pub fn build(self) -> EigenEmbedding {
        EigenEmbedding {
            method: self.method,
            target_dimension: self.target_dimension,
            skip: self.skip,
            random_seed: self.random_seed,
            rank_tolerance: self.rank_tolerance,
            lobpcg: self.lobpcg,
        }
    }
}
