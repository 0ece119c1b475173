//! Scalar maps derived from fitted DKI parameters.
//!
//! Tensor metrics depend on the eigenvalues only. Kurtosis metrics use the
//! analytical solutions of Tabesh et al. (2011):
//!
//! - MK: average of the directional kurtosis over the unit sphere
//! - AK: directional kurtosis along the principal eigenvector
//! - RK: average over directions perpendicular to the principal eigenvector
//!
//! All three need the kurtosis tensor rotated into the eigenvector frame and
//! are only defined when every eigenvalue is positive.
//!
//! Numerical notes:
//! - The closed forms are singular when eigenvalues coincide; within a relative
//!   tolerance of `EQUAL_TOL` the limiting expressions are used instead.
//! - Results are clamped to `KurtosisLimits` (defaults `[-3/7, 10]`).

use nalgebra::Matrix3;

use crate::math::{rd, rf};
use crate::models::dki::{DkiParams, apparent_diffusion, apparent_kurtosis_term, kt_index};

/// Relative tolerance under which two eigenvalues are treated as equal.
const EQUAL_TOL: f64 = 2.5e-2;

/// Eigenvalues at or below this are not considered positive.
const MIN_POSITIVE_EVAL: f64 = 2e-7;

/// Clamp range for kurtosis maps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KurtosisLimits {
    pub min: f64,
    pub max: f64,
}

impl Default for KurtosisLimits {
    fn default() -> Self {
        Self {
            min: -3.0 / 7.0,
            max: 10.0,
        }
    }
}

impl KurtosisLimits {
    fn apply(self, k: f64) -> f64 {
        if !k.is_finite() {
            return 0.0;
        }
        k.clamp(self.min, self.max)
    }
}

pub fn fractional_anisotropy(evals: &[f64; 3]) -> f64 {
    let [l1, l2, l3] = *evals;
    let denom = l1 * l1 + l2 * l2 + l3 * l3;
    if denom <= 0.0 {
        return 0.0;
    }
    let num = (l1 - l2).powi(2) + (l2 - l3).powi(2) + (l3 - l1).powi(2);
    (0.5 * num / denom).sqrt()
}

pub fn mean_diffusivity(evals: &[f64; 3]) -> f64 {
    (evals[0] + evals[1] + evals[2]) / 3.0
}

pub fn axial_diffusivity(evals: &[f64; 3]) -> f64 {
    evals[0]
}

pub fn radial_diffusivity(evals: &[f64; 3]) -> f64 {
    (evals[1] + evals[2]) / 2.0
}

fn positive_evals(evals: &[f64; 3]) -> bool {
    evals.iter().all(|&l| l > MIN_POSITIVE_EVAL)
}

fn nearly_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < a.abs() * EQUAL_TOL
}

/// Element `Ŵ_abcd` of the kurtosis tensor expressed in the eigenvector frame.
pub fn rotated_kt_element(kt: &[f64; 15], evecs: &Matrix3<f64>, idx: [usize; 4]) -> f64 {
    let [a, b, c, d] = idx;
    let mut sum = 0.0;
    for i in 0..3 {
        let ri = evecs[(i, a)];
        for j in 0..3 {
            let rij = ri * evecs[(j, b)];
            for k in 0..3 {
                let rijk = rij * evecs[(k, c)];
                for l in 0..3 {
                    sum += kt[kt_index(i, j, k, l)] * rijk * evecs[(l, d)];
                }
            }
        }
    }
    sum
}

/// Kurtosis along unit direction `n`: `MD² W(n) / (nᵀDn)²`.
pub fn directional_kurtosis(params: &DkiParams, n: &[f64; 3]) -> f64 {
    let adc = apparent_diffusion(&params.tensor(), n);
    if adc <= 0.0 {
        return 0.0;
    }
    let md = mean_diffusivity(&params.evals);
    md * md * apparent_kurtosis_term(&params.kt, n) / (adc * adc)
}

/// `α(x)` from the equal-radial-eigenvalue limit of `F2`.
fn alpha(x: f64) -> f64 {
    if x > 0.0 {
        x.sqrt().atanh() / x.sqrt()
    } else if x < 0.0 {
        (-x).sqrt().atan() / (-x).sqrt()
    } else {
        1.0
    }
}

/// Weight of `Ŵ_1111` in the mean kurtosis.
fn f1(a: f64, b: f64, c: f64) -> f64 {
    if nearly_equal(a, b) && nearly_equal(a, c) {
        return 1.0 / 5.0;
    }
    if nearly_equal(a, b) {
        return f2(c, a, a) / 2.0;
    }
    if nearly_equal(a, c) {
        return f2(b, a, a) / 2.0;
    }

    let s = (b * c).sqrt();
    let rf_v = rf(a / b, a / c, 1.0);
    let rd_v = rd(a / b, a / c, 1.0);
    (a + b + c).powi(2) / (18.0 * (a - b) * (a - c))
        * (s / a * rf_v + (3.0 * a * a - a * b - a * c - b * c) / (3.0 * a * s) * rd_v - 1.0)
}

/// Weight of `Ŵ_2233` in the mean kurtosis.
fn f2(a: f64, b: f64, c: f64) -> f64 {
    if nearly_equal(a, b) && nearly_equal(a, c) {
        return 6.0 / 15.0;
    }
    if nearly_equal(b, c) {
        let l1 = a;
        let l3 = (b + c) / 2.0;
        return 6.0 * (l1 + 2.0 * l3).powi(2) / (144.0 * l3 * l3 * (l1 - l3).powi(2))
            * (l3 * (l1 + 2.0 * l3) + l1 * (l1 - 4.0 * l3) * alpha(1.0 - l1 / l3));
    }

    let s = (b * c).sqrt();
    let rf_v = rf(a / b, a / c, 1.0);
    let rd_v = rd(a / b, a / c, 1.0);
    (a + b + c).powi(2) / (3.0 * (b - c).powi(2))
        * ((b + c) / s * rf_v + (2.0 * a - b - c) / (3.0 * s) * rd_v - 2.0)
}

/// Weight of `Ŵ_2222` in the radial kurtosis.
fn g1(a: f64, b: f64, c: f64) -> f64 {
    if nearly_equal(b, c) {
        let l = (b + c) / 2.0;
        return (a + 2.0 * l).powi(2) / (24.0 * l * l);
    }
    (a + b + c).powi(2) / (18.0 * b * (b - c).powi(2)) * (2.0 * b + (c * c - 3.0 * b * c) / (b * c).sqrt())
}

/// Weight of `Ŵ_2233` in the radial kurtosis.
fn g2(a: f64, b: f64, c: f64) -> f64 {
    if nearly_equal(b, c) {
        let l = (b + c) / 2.0;
        return (a + 2.0 * l).powi(2) / (12.0 * l * l);
    }
    (a + b + c).powi(2) / (3.0 * (b - c).powi(2)) * ((b + c) / (b * c).sqrt() - 2.0)
}

pub fn mean_kurtosis(params: &DkiParams, limits: KurtosisLimits) -> f64 {
    if !positive_evals(&params.evals) {
        return 0.0;
    }
    let [l1, l2, l3] = params.evals;
    let w = |idx| rotated_kt_element(&params.kt, &params.evecs, idx);

    let mk = f1(l1, l2, l3) * w([0, 0, 0, 0])
        + f1(l2, l1, l3) * w([1, 1, 1, 1])
        + f1(l3, l2, l1) * w([2, 2, 2, 2])
        + f2(l1, l2, l3) * w([1, 1, 2, 2])
        + f2(l2, l1, l3) * w([0, 0, 2, 2])
        + f2(l3, l2, l1) * w([0, 0, 1, 1]);
    limits.apply(mk)
}

pub fn axial_kurtosis(params: &DkiParams, limits: KurtosisLimits) -> f64 {
    if !positive_evals(&params.evals) {
        return 0.0;
    }
    let l1 = params.evals[0];
    let md = mean_diffusivity(&params.evals);
    let w1111 = rotated_kt_element(&params.kt, &params.evecs, [0, 0, 0, 0]);
    limits.apply(w1111 * (md / l1).powi(2))
}

pub fn radial_kurtosis(params: &DkiParams, limits: KurtosisLimits) -> f64 {
    if !positive_evals(&params.evals) {
        return 0.0;
    }
    let [l1, l2, l3] = params.evals;
    let w = |idx| rotated_kt_element(&params.kt, &params.evecs, idx);

    let rk = g1(l1, l2, l3) * w([1, 1, 1, 1]) + g1(l1, l3, l2) * w([2, 2, 2, 2]) + g2(l1, l2, l3) * w([1, 1, 2, 2]);
    limits.apply(rk)
}
