//! # Matrix abstractions
//!
//! The embedding strategies never touch a weight matrix directly beyond its
//! dimensions and, for the dense strategy, a dense copy of it. All other work
//! goes through a [`MatrixOperation`] bound to the matrix at construction.
//!
//! Implementations for dense matrices live in [`crate::dense`], for sparse
//! matrices in [`crate::sparse`].

use nalgebra::DMatrix;

/// Which end of the spectrum an operation exposes to an extremal eigensolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectrumEnd {
    /// The operation is a product with the matrix, the wanted eigenpairs are
    /// the largest algebraic ones.
    LargestAlgebraic,
    /// The operation solves a linear system with the matrix, the wanted
    /// eigenpairs are the smallest in magnitude.
    SmallestMagnitude,
}

/// A symmetric N×N matrix to be eigendecomposed. Never mutated.
pub trait WeightMatrix {
    fn nrows(&self) -> usize;

    fn ncols(&self) -> usize;

    /// Materializes the matrix as a dense nalgebra matrix.
    fn to_dense(&self) -> DMatrix<f64>;

    fn is_square(&self) -> bool {
        self.nrows() == self.ncols()
    }
}

/// The action of a weight matrix on a block of column vectors.
///
/// Products compute `W·X`, solves compute `W⁻¹·X`. The returned matrix must have
/// `dim()` rows and as many columns as `x`.
pub trait MatrixOperation {
    /// Order of the matrix the operation is bound to.
    fn dim(&self) -> usize;

    fn apply(&self, x: &DMatrix<f64>) -> anyhow::Result<DMatrix<f64>>;

    fn spectrum_end(&self) -> SpectrumEnd;
}

impl<T: WeightMatrix + ?Sized> WeightMatrix for &T {
    fn nrows(&self) -> usize {
        (**self).nrows()
    }

    fn ncols(&self) -> usize {
        (**self).ncols()
    }

    fn to_dense(&self) -> DMatrix<f64> {
        (**self).to_dense()
    }
}

impl<T: MatrixOperation + ?Sized> MatrixOperation for &T {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn apply(&self, x: &DMatrix<f64>) -> anyhow::Result<DMatrix<f64>> {
        (**self).apply(x)
    }

    fn spectrum_end(&self) -> SpectrumEnd {
        (**self).spectrum_end()
    }
}
