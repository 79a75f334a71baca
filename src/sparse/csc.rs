use anyhow::{anyhow, bail};
use nalgebra::DMatrix;
use nalgebra_sparse::convert::serial::convert_csc_dense;
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::CscMatrix;

use crate::matrix::{MatrixOperation, SpectrumEnd, WeightMatrix};

impl WeightMatrix for CscMatrix<f64> {
    fn nrows(&self) -> usize {
        CscMatrix::nrows(self)
    }

    fn ncols(&self) -> usize {
        CscMatrix::ncols(self)
    }

    fn to_dense(&self) -> DMatrix<f64> {
        convert_csc_dense(self)
    }
}

/// Linear solve with a sparse symmetric positive definite weight matrix,
/// `W⁻¹·X`, through a Cholesky factorization computed once at construction.
pub struct SparseInverseMatrixOperation {
    cholesky: CscCholesky<f64>,
    dim: usize,
}

impl SparseInverseMatrixOperation {
    pub fn new(matrix: &CscMatrix<f64>) -> anyhow::Result<Self> {
        let (nrows, ncols) = (matrix.nrows(), matrix.ncols());
        if nrows != ncols {
            bail!("Cannot factorize a non-square {}x{} matrix", nrows, ncols);
        }
        let cholesky = CscCholesky::factor(matrix)
            .map_err(|e| anyhow!("Sparse Cholesky factorization failed: {:?}", e))?;
        Ok(SparseInverseMatrixOperation {
            cholesky,
            dim: nrows,
        })
    }
}

impl MatrixOperation for SparseInverseMatrixOperation {
    fn dim(&self) -> usize {
        self.dim
    }

    fn apply(&self, x: &DMatrix<f64>) -> anyhow::Result<DMatrix<f64>> {
        if x.nrows() != self.dim {
            bail!(
                "Block has {} rows but the matrix has {} columns",
                x.nrows(),
                self.dim
            );
        }
        Ok(self.cholesky.solve(x.view((0, 0), x.shape())))
    }

    fn spectrum_end(&self) -> SpectrumEnd {
        SpectrumEnd::SmallestMagnitude
    }
}
