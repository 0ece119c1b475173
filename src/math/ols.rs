//! Least squares solvers for the per-voxel log-signal regression.
//!
//! Each voxel solves a small problem of the form:
//!
//! ```text
//! minimize Σ w_i (y_i - x_i^T β)^2
//! ```
//!
//! with 22 columns (tensor, kurtosis and log-S0 terms).
//!
//! Implementation choices:
//! - The unweighted pass shares one design matrix across all voxels, so its
//!   pseudo-inverse is computed once and applied as a matrix-vector product.
//! - The weighted pass scales rows by `sqrt(w_i)` and solves via SVD. Singular
//!   values below the tolerance are dropped, which yields the minimum-norm
//!   solution when the gradient table is rank deficient.
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)

use nalgebra::{DMatrix, DVector};

/// Singular value cutoffs relative to the largest one, tried from strict to loose.
const SVD_TOLERANCES: [f64; 3] = [1e-10, 1e-8, 1e-6];

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);
    let scale = svd.singular_values.max();

    for &tol in &SVD_TOLERANCES {
        if let Ok(beta) = svd.solve(y, tol * scale) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve `minimize Σ w_i (y_i - x_i^T β)^2` by scaling rows with `sqrt(w_i)`.
///
/// Returns `None` for non-finite or negative weights.
pub fn solve_weighted_least_squares(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    w: &DVector<f64>,
) -> Option<DVector<f64>> {
    if w.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return None;
    }

    let mut xw = x.clone();
    let mut yw = y.clone();
    for i in 0..x.nrows() {
        let sw = w[i].sqrt();
        xw.row_mut(i).scale_mut(sw);
        yw[i] *= sw;
    }

    solve_least_squares(&xw, &yw)
}

/// Moore-Penrose pseudo-inverse, used when the same design is solved many times.
pub fn pseudo_inverse(x: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let svd = x.clone().svd(true, true);
    let scale = svd.singular_values.max();

    for &tol in &SVD_TOLERANCES {
        if let Ok(pinv) = svd.clone().pseudo_inverse(tol * scale) {
            if pinv.iter().all(|v| v.is_finite()) {
                return Some(pinv);
            }
        }
    }
    None
}
