//! Sparse weight matrices and their operations.
//!
//! - [`SparseMatrixOperation`]: CSR product, right-hand sides processed in parallel
//! - [`SparseInverseMatrixOperation`]: CSC Cholesky solve for the smallest eigenpairs

pub mod csc;
pub mod csr;

pub use csc::SparseInverseMatrixOperation;
pub use csr::SparseMatrixOperation;
