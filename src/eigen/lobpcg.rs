//! Largest eigenpairs of a matrix operation through LOBPCG.
//!
//! The operation is handed to `linfa_linalg` as a matrix-free operator, so memory
//! stays at a few blocks of `count` columns regardless of the matrix order. The
//! operator is rescaled by a norm estimate taken from the starting block, which makes
//! the residual tolerance relative. Operators with fewer than five rows per wanted
//! eigenpair are too small for the block iteration and are assembled and decomposed
//! densely instead.

use std::cell::RefCell;

use linfa_linalg::lobpcg::{lobpcg, Order as TruncatedOrder};
use log::debug;
use nalgebra::DMatrix;
use ndarray::{Array2, ArrayView2, ArrayViewMut2};
use nshare::{IntoNalgebra, IntoNdarray2};
use rand::Rng;

use super::check_block;
use super::iterative::LobpcgConfig;
use super::randomized::gaussian_sketch;
use super::symmetric::symmetric_eigen;
use crate::error::{EmbeddingError, Result};
use crate::matrix::MatrixOperation;

const MIN_ROWS_PER_PAIR: usize = 5;

/// Eigenpairs of the operation, vector `j` in column `j`. Not sorted.
#[derive(Debug)]
pub(crate) struct OperatorEigenpairs {
    pub values: Vec<f64>,
    pub vectors: DMatrix<f64>,
}

/// Computes the `count` largest algebraic eigenpairs of `operation`, starting the
/// block iteration from a Gaussian block drawn from `rng`.
pub(crate) fn largest_eigenpairs<O, R>(
    operation: &O,
    count: usize,
    config: &LobpcgConfig,
    rng: &mut R,
) -> Result<OperatorEigenpairs>
where
    O: MatrixOperation + ?Sized,
    R: Rng + ?Sized,
{
    let n = operation.dim();
    if count == 0 || count > n {
        return Err(EmbeddingError::invalid(format!(
            "Cannot compute {} eigenpairs of an operator of order {}",
            count, n
        )));
    }
    if n < MIN_ROWS_PER_PAIR * count {
        debug!(
            "Operator of order {} is too small for a block of {}, decomposing densely",
            n, count
        );
        return dense_eigenpairs(operation, count);
    }

    let initial = gaussian_sketch(n, count, rng);
    let sketched = operation.apply(&initial)?;
    check_block(&sketched, n, count, "starting block")?;
    let scale = sketched
        .column_iter()
        .zip(initial.column_iter())
        .map(|(image, start)| image.norm() / start.norm())
        .fold(0.0, f64::max);
    let scale = if scale > 0.0 { scale } else { 1.0 };
    debug!("LOBPCG for {} eigenpairs, operator norm estimate {:e}", count, scale);

    let failure: RefCell<Option<EmbeddingError>> = RefCell::new(None);
    let apply = |x: ArrayView2<f64>| -> Array2<f64> {
        let cols = x.ncols();
        if failure.borrow().is_some() {
            return Array2::zeros((n, cols));
        }
        let block = x.into_nalgebra().clone_owned();
        let applied = operation
            .apply(&block)
            .map_err(EmbeddingError::from)
            .and_then(|y| check_block(&y, n, cols, "operator block").map(|_| y));
        match applied {
            Ok(y) => y.unscale(scale).into_ndarray2(),
            Err(error) => {
                *failure.borrow_mut() = Some(error);
                Array2::zeros((n, cols))
            }
        }
    };
    let outcome = lobpcg(
        apply,
        initial.into_ndarray2(),
        |_: ArrayViewMut2<f64>| {},
        None,
        config.tolerance,
        config.max_iterations,
        TruncatedOrder::Largest,
    );
    if let Some(error) = failure.into_inner() {
        return Err(error);
    }

    match outcome {
        Ok(result) => Ok(OperatorEigenpairs {
            values: result.eigvals.iter().map(|&theta| theta * scale).collect(),
            vectors: result.eigvecs.view().into_nalgebra().clone_owned(),
        }),
        Err((error, _)) => Err(EmbeddingError::solver(format!(
            "LOBPCG did not converge to tolerance {:e} within {} iterations: {}",
            config.tolerance, config.max_iterations, error
        ))),
    }
}

fn dense_eigenpairs<O>(operation: &O, count: usize) -> Result<OperatorEigenpairs>
where
    O: MatrixOperation + ?Sized,
{
    let n = operation.dim();
    let operator = operation.apply(&DMatrix::identity(n, n))?;
    check_block(&operator, n, n, "assembled operator")?;
    let (values, vectors) = symmetric_eigen((&operator + operator.transpose()) * 0.5)?;

    Ok(OperatorEigenpairs {
        values: (0..count).map(|j| values[n - 1 - j]).collect(),
        vectors: DMatrix::from_fn(n, count, |i, j| vectors[(i, n - 1 - j)]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dense::DenseMatrixOperation;
    use crate::eigen::test_matrices::assert_orthonormal_columns;
    use crate::matrix::SpectrumEnd;
    use approx::assert_abs_diff_eq;
    use nalgebra::DVector;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct FailingOperation {
        dim: usize,
    }

    impl MatrixOperation for FailingOperation {
        fn dim(&self) -> usize {
            self.dim
        }

        fn apply(&self, _x: &DMatrix<f64>) -> anyhow::Result<DMatrix<f64>> {
            anyhow::bail!("factorization went stale")
        }

        fn spectrum_end(&self) -> SpectrumEnd {
            SpectrumEnd::LargestAlgebraic
        }
    }

    fn sorted_descending(mut values: Vec<f64>) -> Vec<f64> {
        values.sort_by(|a, b| b.total_cmp(a));
        values
    }

    #[test]
    fn test_small_operator_is_decomposed_densely() {
        let matrix = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        let op = DenseMatrixOperation::new(&matrix);
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let pairs = largest_eigenpairs(&op, 3, &LobpcgConfig::default(), &mut rng).unwrap();

        for (found, expected) in pairs.values.iter().zip([6.0, 5.0, 4.0]) {
            assert_abs_diff_eq!(*found, expected, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(pairs.vectors[(5, 0)].abs(), 1.0, epsilon = 1e-12);
        assert_orthonormal_columns(&pairs.vectors, 1e-12);
    }

    #[test]
    fn test_block_iteration_finds_largest() {
        let values: Vec<f64> = (1..=60).map(|i| i as f64).collect();
        let matrix = DMatrix::from_diagonal(&DVector::from_vec(values));
        let op = DenseMatrixOperation::new(&matrix);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let pairs = largest_eigenpairs(&op, 3, &LobpcgConfig::default(), &mut rng).unwrap();

        let found = sorted_descending(pairs.values.clone());
        assert_abs_diff_eq!(found[0], 60.0, epsilon = 1e-6);
        assert_abs_diff_eq!(found[1], 59.0, epsilon = 1e-6);
        assert_abs_diff_eq!(found[2], 58.0, epsilon = 1e-6);
        assert_eq!(pairs.vectors.shape(), (60, 3));
        for j in 0..3 {
            let v = pairs.vectors.column(j).into_owned();
            let residual = &matrix * &v - &v * pairs.values[j];
            assert!(residual.norm() < 1e-5, "residual {}", residual.norm());
        }
    }

    #[test]
    fn test_operation_failure_is_reported() {
        let op = FailingOperation { dim: 40 };
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let result = largest_eigenpairs(&op, 2, &LobpcgConfig::default(), &mut rng);

        match result {
            Err(EmbeddingError::Operation(error)) => {
                assert_eq!(error.to_string(), "factorization went stale")
            }
            other => panic!("expected an operation error, got {:?}", other),
        }
    }

    #[test]
    fn test_iteration_budget_exhaustion_is_solver_failure() {
        let values: Vec<f64> = (0..200).map(|i| 1.0 + i as f64 * 1e-3).collect();
        let matrix = DMatrix::from_diagonal(&DVector::from_vec(values));
        let op = DenseMatrixOperation::new(&matrix);
        let config = LobpcgConfig {
            tolerance: 1e-12,
            max_iterations: 2,
        };

        let result = largest_eigenpairs(&op, 3, &config, &mut ChaCha8Rng::seed_from_u64(5));
        assert!(matches!(result, Err(EmbeddingError::SolverFailure(_))));
    }
}
