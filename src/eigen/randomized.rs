//! # Randomized eigendecomposition
//!
//! Range finding with a Gaussian sketch followed by a Rayleigh-Ritz projection, in
//! the spirit of randomized SVD:
//!
//! 1. draw an N×k standard normal sketch `O` (Box-Muller), k = `target_dimension + skip`
//! 2. `Y = op(O)`, orthonormalized column by column with modified Gram-Schmidt
//! 3. `B1 = op(Y)`, `B` the least squares solution of `Y·B = B1` (QR)
//! 4. eigendecompose the small matrix `B` and lift its eigenvectors with `Y`
//!
//! When a column of `Y` collapses below the rank threshold during
//! orthonormalization, that column and all later ones are zeroed. The result then
//! carries a rank below the requested one and its trailing directions are zero.
//!
//! With a solve operation the Ritz values `θ` belong to the inverse of the weight
//! matrix and are reported as `1/θ`, then ordered ascending like every other
//! strategy. Directions lost to rank deficiency have no finite counterpart there,
//! they are reported with an infinite eigenvalue and sort last.

use std::f64::consts::TAU;

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use rand::distr::{Distribution, Open01};
use rand::Rng;

use super::symmetric::symmetric_eigen;
use super::{check_block, validate_request, EmbeddingResult, EmbeddingStrategy};
use crate::error::{EmbeddingError, Result};
use crate::matrix::{MatrixOperation, SpectrumEnd, WeightMatrix};
use crate::utils::{ascending_order, TimedContext};

/// Column norm below which the sketched range is considered exhausted.
pub const DEFAULT_RANK_TOLERANCE: f64 = 1e-4;

/// Threshold for detecting rank deficiency during orthonormalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RankTolerance {
    /// Compare residual column norms against a fixed value.
    Absolute(f64),
    /// Scale the tolerance by the largest column norm of the sketched range,
    /// which tracks the norm of the operation.
    Relative(f64),
}

impl Default for RankTolerance {
    fn default() -> Self {
        RankTolerance::Absolute(DEFAULT_RANK_TOLERANCE)
    }
}

impl RankTolerance {
    fn threshold(&self, range: &DMatrix<f64>) -> f64 {
        match *self {
            RankTolerance::Absolute(tolerance) => tolerance,
            RankTolerance::Relative(tolerance) => {
                let scale = range
                    .column_iter()
                    .map(|column| column.norm())
                    .fold(0.0, f64::max);
                tolerance * scale
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let tolerance = match *self {
            RankTolerance::Absolute(t) | RankTolerance::Relative(t) => t,
        };
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(EmbeddingError::invalid(format!(
                "Rank tolerance must be finite and non-negative, got {}",
                tolerance
            )));
        }
        Ok(())
    }
}

/// Approximate eigen-embedding through random sketching.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomizedStrategy {
    rank_tolerance: RankTolerance,
}

impl RandomizedStrategy {
    pub fn new(rank_tolerance: RankTolerance) -> Self {
        RandomizedStrategy { rank_tolerance }
    }

    pub fn rank_tolerance(&self) -> RankTolerance {
        self.rank_tolerance
    }
}

impl EmbeddingStrategy for RandomizedStrategy {
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
        self.rank_tolerance.validate()?;
        let _timer = TimedContext::new("Randomized eigendecomposition");

        let n = operation.dim();
        let k = target_dimension + skip;
        debug!(
            "Randomized eigendecomposition of a {}x{} matrix, sketch with {} columns",
            n, n, k
        );

        let sketch = gaussian_sketch(n, k, rng);
        let mut range = operation.apply(&sketch)?;
        check_block(&range, n, k, "sketched range")?;

        let threshold = self.rank_tolerance.threshold(&range);
        let rank = orthonormalize_columns(&mut range, threshold);
        if rank < k {
            warn!(
                "Sketched range is rank deficient: {} of {} directions above {:e}",
                rank, k, threshold
            );
        }

        let applied = operation.apply(&range)?;
        check_block(&applied, n, k, "projected range")?;
        let reduced = project(&range, &applied, rank)?;

        let (ritz_values, eigenvectors) = symmetric_eigen(reduced)?;
        let lifted = &range * &eigenvectors;
        let eigenvalues = match operation.spectrum_end() {
            SpectrumEnd::LargestAlgebraic => ritz_values.iter().copied().collect(),
            SpectrumEnd::SmallestMagnitude => invert_ritz_values(&ritz_values, &eigenvectors, rank)?,
        };

        let order = ascending_order(&eigenvalues);
        let kept = &order[skip..skip + target_dimension];
        Ok(EmbeddingResult::new(
            DMatrix::from_fn(n, target_dimension, |i, j| lifted[(i, kept[j])]),
            DVector::from_fn(target_dimension, |j, _| eigenvalues[kept[j]]),
            rank,
            k,
        ))
    }
}

/// Draws a `rows`×`cols` matrix of independent standard normal samples.
///
/// Box-Muller over uniforms from the open interval (0, 1): each pair of columns of a
/// row consumes one `(v1, v2)` draw for a cosine and a sine sample. A trailing odd
/// column takes the cosine sample only.
pub(crate) fn gaussian_sketch<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> DMatrix<f64> {
    let mut sketch = DMatrix::zeros(rows, cols);
    for i in 0..rows {
        let mut j = 0;
        while j + 1 < cols {
            let (cos_sample, sin_sample) = box_muller(rng);
            sketch[(i, j)] = cos_sample;
            sketch[(i, j + 1)] = sin_sample;
            j += 2;
        }
        if j < cols {
            sketch[(i, j)] = box_muller(rng).0;
        }
    }
    sketch
}

fn box_muller<R: Rng + ?Sized>(rng: &mut R) -> (f64, f64) {
    let v1: f64 = Open01.sample(rng);
    let v2: f64 = Open01.sample(rng);
    let len = (-2.0 * v1.ln()).sqrt();
    let angle = TAU * v2;
    (len * angle.cos(), len * angle.sin())
}

/// Modified Gram-Schmidt over the columns of `y`, left to right.
///
/// Returns the number of orthonormal columns. Once a residual norm falls to
/// `threshold` or below, that column and every following column are zeroed.
pub(crate) fn orthonormalize_columns(y: &mut DMatrix<f64>, threshold: f64) -> usize {
    let (rows, cols) = y.shape();
    for i in 0..cols {
        for j in 0..i {
            let r = y.column(i).dot(&y.column(j));
            for row in 0..rows {
                let basis_value = y[(row, j)];
                y[(row, i)] -= r * basis_value;
            }
        }
        let norm = y.column(i).norm();
        if norm <= threshold {
            y.columns_mut(i, cols - i).fill(0.0);
            return i;
        }
        y.column_mut(i).unscale_mut(norm);
    }
    cols
}

/// Maps Ritz values of an inverse operation to eigenvalues of the weight matrix.
///
/// Eigenvectors of the reduced matrix living outside the first `rank` coordinates
/// lift to zero vectors and get an infinite eigenvalue.
fn invert_ritz_values(
    ritz_values: &DVector<f64>,
    eigenvectors: &DMatrix<f64>,
    rank: usize,
) -> Result<Vec<f64>> {
    ritz_values
        .iter()
        .enumerate()
        .map(|(j, &theta)| {
            let weight = eigenvectors.view((0, j), (rank, 1)).norm();
            if weight < 0.5 {
                Ok(f64::INFINITY)
            } else if theta == 0.0 {
                Err(EmbeddingError::solver(
                    "Inverse operation has a zero Ritz value",
                ))
            } else {
                Ok(1.0 / theta)
            }
        })
        .collect()
}

/// Rayleigh-Ritz projection: least squares `B` with `Y·B = B1`.
///
/// Only the first `rank` columns of `Y` are orthonormal, the rest are zero, so the
/// QR solve runs on that block and the rows of `B` belonging to zero columns stay
/// zero. The result is symmetrized before it reaches the symmetric eigensolver.
fn project(range: &DMatrix<f64>, applied: &DMatrix<f64>, rank: usize) -> Result<DMatrix<f64>> {
    let k = range.ncols();
    let mut reduced = DMatrix::zeros(k, k);
    if rank > 0 {
        let qr = range.columns(0, rank).into_owned().qr();
        let rhs = qr.q().transpose() * applied;
        let coefficients = qr.r().solve_upper_triangular(&rhs).ok_or_else(|| {
            EmbeddingError::solver("Least squares projection failed, triangular factor is singular")
        })?;
        reduced.view_mut((0, 0), (rank, k)).copy_from(&coefficients);
    }
    Ok((&reduced + reduced.transpose()) * 0.5)
}
