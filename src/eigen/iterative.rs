//! Iterative eigen-embedding for large, typically sparse, weight matrices.
//!
//! Computes `target_dimension + skip` extremal eigenpairs at the end of the
//! spectrum reported by the operation, orders them ascending, drops the first
//! `skip` and returns the following `target_dimension`. Product operations target
//! the largest algebraic eigenvalues, so `skip` removes the least extreme of the
//! computed pairs. Solve operations target the smallest eigenvalues of the weight
//! matrix, found as the largest eigenvalues `θ` of its inverse and reported as
//! `1/θ`, so `skip` removes the smallest ones. The solve path assumes a positive
//! definite weight matrix, as the sparse Cholesky solve does.
//!
//! The solver is compiled with the `lobpcg` feature. Without it every request
//! fails with [`EmbeddingError::FeatureUnavailable`].

use rand::Rng;

use super::{validate_request, EmbeddingResult, EmbeddingStrategy};
use crate::error::{EmbeddingError, Result};
use crate::matrix::{MatrixOperation, WeightMatrix};

/// Convergence settings of the LOBPCG solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LobpcgConfig {
    /// Wanted residual norms, relative to the operator norm estimate.
    pub tolerance: f32,
    /// Block iterations before giving up with [`EmbeddingError::SolverFailure`].
    pub max_iterations: usize,
}

impl Default for LobpcgConfig {
    fn default() -> Self {
        LobpcgConfig {
            tolerance: 1e-6,
            max_iterations: 1000,
        }
    }
}

/// Eigen-embedding through the LOBPCG solver.
#[derive(Debug, Clone, Copy, Default)]
pub struct IterativeStrategy {
    config: LobpcgConfig,
}

impl IterativeStrategy {
    pub fn new(config: LobpcgConfig) -> Self {
        IterativeStrategy { config }
    }

    pub fn config(&self) -> &LobpcgConfig {
        &self.config
    }

    /// Whether the solver was compiled into this build.
    pub fn is_available() -> bool {
        cfg!(feature = "lobpcg")
    }
}

impl EmbeddingStrategy for IterativeStrategy {
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
        R: Rng + ?Sized,
    {
        validate_request(matrix, operation, target_dimension, skip)?;
        if !self.config.tolerance.is_finite() || self.config.tolerance <= 0.0 {
            return Err(EmbeddingError::invalid(format!(
                "LOBPCG tolerance must be finite and positive, got {}",
                self.config.tolerance
            )));
        }
        if self.config.max_iterations == 0 {
            return Err(EmbeddingError::invalid(
                "LOBPCG needs at least one iteration",
            ));
        }
        solve(&self.config, operation, target_dimension, skip, rng)
    }
}

#[cfg(feature = "lobpcg")]
fn solve<O, R>(
    config: &LobpcgConfig,
    operation: &O,
    target_dimension: usize,
    skip: usize,
    rng: &mut R,
) -> Result<EmbeddingResult>
where
    O: MatrixOperation + ?Sized,
    R: Rng + ?Sized,
{
    use log::debug;
    use nalgebra::{DMatrix, DVector};

    use super::lobpcg::largest_eigenpairs;
    use crate::matrix::SpectrumEnd;
    use crate::utils::{ascending_order, TimedContext};

    let _timer = TimedContext::new("LOBPCG eigendecomposition");
    let count = target_dimension + skip;
    let end = operation.spectrum_end();
    debug!(
        "LOBPCG for {} eigenpairs ({:?}) of an operator of order {}",
        count,
        end,
        operation.dim()
    );

    let pairs = largest_eigenpairs(operation, count, config, rng)?;

    let eigenvalues = match end {
        SpectrumEnd::LargestAlgebraic => pairs.values,
        SpectrumEnd::SmallestMagnitude => pairs
            .values
            .iter()
            .map(|&theta| {
                if theta == 0.0 {
                    Err(EmbeddingError::solver(
                        "Inverse operation has a zero eigenvalue",
                    ))
                } else {
                    Ok(1.0 / theta)
                }
            })
            .collect::<Result<Vec<f64>>>()?,
    };

    let order = ascending_order(&eigenvalues);
    let kept = &order[skip..];
    let n = pairs.vectors.nrows();
    let embedding = DMatrix::from_fn(n, target_dimension, |i, j| pairs.vectors[(i, kept[j])]);
    let values = DVector::from_fn(target_dimension, |j, _| eigenvalues[kept[j]]);

    Ok(EmbeddingResult::new(embedding, values, count, count))
}

#[cfg(not(feature = "lobpcg"))]
fn solve<O, R>(
    _config: &LobpcgConfig,
    _operation: &O,
    _target_dimension: usize,
    _skip: usize,
    _rng: &mut R,
) -> Result<EmbeddingResult>
where
    O: MatrixOperation + ?Sized,
    R: Rng + ?Sized,
{
    Err(EmbeddingError::FeatureUnavailable {
        method: "Iterative",
        feature: "lobpcg",
    })
}

#[cfg(all(test, feature = "lobpcg"))]
mod tests {
    use super::*;
    use crate::dense::{DenseInverseMatrixOperation, DenseMatrixOperation};
    use crate::eigen::dense::DenseStrategy;
    use crate::eigen::test_matrices::{assert_orthonormal_columns, random_spd};
    use crate::sparse::test_matrices::{laplacian_1d_csc, laplacian_1d_csr};
    use crate::sparse::{SparseInverseMatrixOperation, SparseMatrixOperation};
    use approx::assert_abs_diff_eq;
    use nalgebra::{DMatrix, DVector};
    use nalgebra_sparse::{CooMatrix, CsrMatrix};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn diagonal(values: &[f64]) -> DMatrix<f64> {
        DMatrix::from_diagonal(&DVector::from_column_slice(values))
    }

    #[test]
    fn test_largest_end_skips_least_extreme() {
        let values: Vec<f64> = (1..=40).map(|i| i as f64).collect();
        let matrix = diagonal(&values);
        let op = DenseMatrixOperation::new(&matrix);
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let result = IterativeStrategy::default()
            .embed(&matrix, &op, 2, 1, &mut rng)
            .unwrap();

        assert_eq!(result.embedding().shape(), (40, 2));
        assert_abs_diff_eq!(result.eigenvalues()[0], 39.0, epsilon = 1e-6);
        assert_abs_diff_eq!(result.eigenvalues()[1], 40.0, epsilon = 1e-6);
        assert_abs_diff_eq!(result.embedding()[(38, 0)].abs(), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(result.embedding()[(39, 1)].abs(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_small_product_problem_keeps_top_eigenpairs() {
        let matrix = diagonal(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let op = DenseMatrixOperation::new(&matrix);
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let result = IterativeStrategy::default()
            .embed(&matrix, &op, 2, 1, &mut rng)
            .unwrap();

        assert_abs_diff_eq!(result.eigenvalues()[0], 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(result.eigenvalues()[1], 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(result.embedding()[(4, 0)].abs(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(result.embedding()[(5, 1)].abs(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_small_solve_problem_drops_smallest() {
        let matrix = diagonal(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let op = DenseInverseMatrixOperation::new(&matrix).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let iterative = IterativeStrategy::default()
            .embed(&matrix, &op, 2, 4, &mut rng)
            .unwrap();

        assert_abs_diff_eq!(iterative.eigenvalues()[0], 5.0, epsilon = 1e-10);
        assert_abs_diff_eq!(iterative.eigenvalues()[1], 6.0, epsilon = 1e-10);
    }

    #[test]
    fn test_smallest_end_matches_dense() {
        let matrix = random_spd(40, 3);
        let op = DenseInverseMatrixOperation::new(&matrix).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let iterative = IterativeStrategy::default()
            .embed(&matrix, &op, 3, 1, &mut rng)
            .unwrap();
        let dense = DenseStrategy.embed(&matrix, &op, 3, 1, &mut rng).unwrap();

        for j in 0..3 {
            assert_abs_diff_eq!(iterative.eigenvalues()[j], dense.eigenvalues()[j], epsilon = 1e-6);
            let overlap = iterative.embedding().column(j).dot(&dense.embedding().column(j));
            assert_abs_diff_eq!(overlap.abs(), 1.0, epsilon = 1e-6);
        }
        assert_orthonormal_columns(iterative.embedding(), 1e-6);
    }

    #[test]
    fn test_sparse_laplacian_smallest_eigenpairs() {
        let n = 50;
        let matrix = laplacian_1d_csc(n);
        let op = SparseInverseMatrixOperation::new(&matrix).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let result = IterativeStrategy::default()
            .embed(&matrix, &op, 3, 1, &mut rng)
            .unwrap();

        for j in 0..3 {
            let k = (j + 2) as f64;
            let expected = 2.0 - 2.0 * (k * std::f64::consts::PI / (n as f64 + 1.0)).cos();
            assert_abs_diff_eq!(result.eigenvalues()[j], expected, epsilon = 1e-8);
        }
        assert_orthonormal_columns(result.embedding(), 1e-6);
    }

    #[test]
    fn test_sparse_product_largest_eigenpairs() {
        let n = 30;
        let matrix = laplacian_1d_csr(n);
        let op = SparseMatrixOperation::new(&matrix);
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        let result = IterativeStrategy::default()
            .embed(&matrix, &op, 2, 0, &mut rng)
            .unwrap();

        for j in 0..2 {
            let k = (n - 1 + j) as f64;
            let expected = 2.0 - 2.0 * (k * std::f64::consts::PI / (n as f64 + 1.0)).cos();
            assert_abs_diff_eq!(result.eigenvalues()[j], expected, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_large_sparse_matrix_runs_in_block_memory() {
        let n = 20_000;
        let mut coo = CooMatrix::new(n, n);
        for i in 0..n {
            let value = match i {
                0 => 100.0,
                1 => 50.0,
                _ => 1.0 + (i % 7) as f64 * 0.05,
            };
            coo.push(i, i, value);
        }
        let matrix = CsrMatrix::from(&coo);
        let op = SparseMatrixOperation::new(&matrix);
        let mut rng = ChaCha8Rng::seed_from_u64(13);

        let result = IterativeStrategy::default()
            .embed(&matrix, &op, 2, 0, &mut rng)
            .unwrap();

        assert_eq!(result.embedding().shape(), (n, 2));
        assert_abs_diff_eq!(result.eigenvalues()[0], 50.0, epsilon = 1e-6);
        assert_abs_diff_eq!(result.eigenvalues()[1], 100.0, epsilon = 1e-6);
        assert_abs_diff_eq!(result.embedding()[(1, 0)].abs(), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(result.embedding()[(0, 1)].abs(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let matrix = DMatrix::<f64>::identity(4, 4);
        let op = DenseMatrixOperation::new(&matrix);
        let zero_tolerance = IterativeStrategy::new(LobpcgConfig {
            tolerance: 0.0,
            ..LobpcgConfig::default()
        });
        let no_iterations = IterativeStrategy::new(LobpcgConfig {
            max_iterations: 0,
            ..LobpcgConfig::default()
        });

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(matches!(
            zero_tolerance.embed(&matrix, &op, 2, 0, &mut rng),
            Err(EmbeddingError::InvalidArgument(_))
        ));
        assert!(matches!(
            no_iterations.embed(&matrix, &op, 2, 0, &mut rng),
            Err(EmbeddingError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_rejects_oversized_request() {
        let matrix = DMatrix::<f64>::identity(4, 4);
        let op = DenseMatrixOperation::new(&matrix);
        let result = IterativeStrategy::default().embed(&matrix, &op, 4, 1, &mut ChaCha8Rng::seed_from_u64(1));
        assert!(matches!(result, Err(EmbeddingError::InvalidArgument(_))));
    }
}
