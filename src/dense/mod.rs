use anyhow::{anyhow, bail};
use nalgebra::{DMatrix, Dyn, LU};
use ndarray::Array2;
use nshare::IntoNalgebra;

use crate::matrix::{MatrixOperation, SpectrumEnd, WeightMatrix};

impl WeightMatrix for DMatrix<f64> {
    fn nrows(&self) -> usize {
        self.shape().0
    }

    fn ncols(&self) -> usize {
        self.shape().1
    }

    fn to_dense(&self) -> DMatrix<f64> {
        self.clone()
    }
}

impl WeightMatrix for Array2<f64> {
    fn nrows(&self) -> usize {
        self.dim().0
    }

    fn ncols(&self) -> usize {
        self.dim().1
    }

    fn to_dense(&self) -> DMatrix<f64> {
        self.view().into_nalgebra().clone_owned()
    }
}

/// Right product with a dense weight matrix, `W·X`.
pub struct DenseMatrixOperation<'a> {
    matrix: &'a DMatrix<f64>,
}

impl<'a> DenseMatrixOperation<'a> {
    pub fn new(matrix: &'a DMatrix<f64>) -> Self {
        DenseMatrixOperation { matrix }
    }
}

impl MatrixOperation for DenseMatrixOperation<'_> {
    fn dim(&self) -> usize {
        self.matrix.ncols()
    }

    fn apply(&self, x: &DMatrix<f64>) -> anyhow::Result<DMatrix<f64>> {
        if x.nrows() != self.matrix.ncols() {
            bail!(
                "Block has {} rows but the matrix has {} columns",
                x.nrows(),
                self.matrix.ncols()
            );
        }
        Ok(self.matrix * x)
    }

    fn spectrum_end(&self) -> SpectrumEnd {
        SpectrumEnd::LargestAlgebraic
    }
}

/// Linear solve with a dense weight matrix, `W⁻¹·X`, through a partial pivoting LU
/// factorization computed once at construction.
pub struct DenseInverseMatrixOperation {
    lu: LU<f64, Dyn, Dyn>,
    dim: usize,
}

impl DenseInverseMatrixOperation {
    pub fn new(matrix: &DMatrix<f64>) -> anyhow::Result<Self> {
        let (nrows, ncols) = matrix.shape();
        if nrows != ncols {
            bail!("Cannot factorize a non-square {}x{} matrix", nrows, ncols);
        }
        let lu = matrix.clone().lu();
        if !lu.is_invertible() {
            bail!("Matrix is singular, LU factorization cannot be used for solves");
        }
        Ok(DenseInverseMatrixOperation { lu, dim: nrows })
    }
}

impl MatrixOperation for DenseInverseMatrixOperation {
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
        self.lu
            .solve(x)
            .ok_or_else(|| anyhow!("LU solve failed, matrix is singular"))
    }

    fn spectrum_end(&self) -> SpectrumEnd {
        SpectrumEnd::SmallestMagnitude
    }
}
