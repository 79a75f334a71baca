use anyhow::bail;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::convert::serial::convert_csr_dense;
use nalgebra_sparse::CsrMatrix;
use rayon::prelude::*;

use crate::matrix::{MatrixOperation, SpectrumEnd, WeightMatrix};

impl WeightMatrix for CsrMatrix<f64> {
    fn nrows(&self) -> usize {
        CsrMatrix::nrows(self)
    }

    fn ncols(&self) -> usize {
        CsrMatrix::ncols(self)
    }

    fn to_dense(&self) -> DMatrix<f64> {
        convert_csr_dense(self)
    }
}

/// Right product with a sparse CSR weight matrix, `W·X`.
///
/// Each column of the block is multiplied independently on the rayon pool.
pub struct SparseMatrixOperation<'a> {
    matrix: &'a CsrMatrix<f64>,
}

impl<'a> SparseMatrixOperation<'a> {
    pub fn new(matrix: &'a CsrMatrix<f64>) -> Self {
        SparseMatrixOperation { matrix }
    }
}

impl MatrixOperation for SparseMatrixOperation<'_> {
    fn dim(&self) -> usize {
        self.matrix.ncols()
    }

    fn apply(&self, x: &DMatrix<f64>) -> anyhow::Result<DMatrix<f64>> {
        let nrows = self.matrix.nrows();
        if x.nrows() != self.matrix.ncols() {
            bail!(
                "Block has {} rows but the matrix has {} columns",
                x.nrows(),
                self.matrix.ncols()
            );
        }
        if x.ncols() == 0 {
            return Ok(DMatrix::zeros(nrows, 0));
        }

        let columns: Vec<DVector<f64>> = (0..x.ncols())
            .into_par_iter()
            .map(|j| {
                let rhs = x.column(j);
                DVector::from_iterator(
                    nrows,
                    self.matrix.row_iter().map(|row| {
                        row.col_indices()
                            .iter()
                            .zip(row.values())
                            .map(|(&col, &value)| value * rhs[col])
                            .sum::<f64>()
                    }),
                )
            })
            .collect();

        Ok(DMatrix::from_columns(&columns))
    }

    fn spectrum_end(&self) -> SpectrumEnd {
        SpectrumEnd::LargestAlgebraic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::test_matrices::laplacian_1d_csr;
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn test_sparse_product_matches_dense() {
        let matrix = laplacian_1d_csr(50);
        let dense = WeightMatrix::to_dense(&matrix);
        let mut rng = StdRng::seed_from_u64(42);
        let x = DMatrix::from_fn(50, 7, |_, _| rng.random_range(-1.0..1.0));

        let op = SparseMatrixOperation::new(&matrix);
        let sparse_result = op.apply(&x).unwrap();
        let dense_result = &dense * &x;

        assert_eq!(sparse_result.shape(), (50, 7));
        assert_abs_diff_eq!((sparse_result - dense_result).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sparse_weight_matrix() {
        let matrix = laplacian_1d_csr(4);
        let dense = WeightMatrix::to_dense(&matrix);

        assert!(WeightMatrix::is_square(&matrix));
        assert_abs_diff_eq!(dense[(0, 0)], 2.0);
        assert_abs_diff_eq!(dense[(0, 1)], -1.0);
        assert_abs_diff_eq!(dense[(0, 2)], 0.0);
        assert_abs_diff_eq!(dense[(3, 2)], -1.0);
    }

    #[test]
    fn test_sparse_product_empty_block() {
        let matrix = laplacian_1d_csr(3);
        let op = SparseMatrixOperation::new(&matrix);
        let result = op.apply(&DMatrix::zeros(3, 0)).unwrap();
        assert_eq!(result.shape(), (3, 0));
        assert!(op.apply(&DMatrix::zeros(4, 1)).is_err());
    }
}
