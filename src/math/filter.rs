//! Separable Gaussian smoothing of n-dimensional arrays.
//!
//! The filter is applied as a sequence of 1D correlations, one per axis with a
//! positive sigma. Axes with `sigma == 0` are skipped, so a sigma vector such as
//! `[0.5, 0.5, 0.0, 0.0]` smooths in-plane only and never mixes slices or
//! diffusion volumes.
//!
//! Conventions:
//! - the kernel is truncated at `4σ`, radius `⌊4σ + 0.5⌋`, and normalised to sum 1
//! - samples outside the array are mirrored about the edge including the edge
//!   sample (`d c b a | a b c d | d c b a`)

use ndarray::{Array, Axis, Dimension};

use crate::error::AppError;

/// Kernel half-width in units of sigma.
const TRUNCATE: f64 = 4.0;

/// Normalised 1D Gaussian kernel of length `2r + 1`.
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (TRUNCATE * sigma + 0.5) as usize;
    let denom = 2.0 * sigma * sigma;

    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-(x * x) / denom).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    kernel
}

/// Map a possibly out-of-range index onto `0..n` by half-sample reflection.
fn reflect_index(i: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let m = i.rem_euclid(period) as usize;
    if m < n { m } else { 2 * n - 1 - m }
}

/// Smooth `data` with a per-axis Gaussian.
///
/// `sigma` must have one entry per axis; negative or non-finite entries are rejected.
pub fn gaussian_filter<D: Dimension>(
    data: &Array<f64, D>,
    sigma: &[f64],
) -> Result<Array<f64, D>, AppError> {
    if sigma.len() != data.ndim() {
        return Err(AppError::new(
            4,
            format!(
                "Gaussian filter needs one sigma per axis: got {} for a {}D array.",
                sigma.len(),
                data.ndim()
            ),
        ));
    }
    if sigma.iter().any(|s| !s.is_finite() || *s < 0.0) {
        return Err(AppError::new(4, format!("Invalid Gaussian sigma {sigma:?}.")));
    }

    let mut out = data.clone();
    let mut scratch = Vec::new();

    for (axis, &s) in sigma.iter().enumerate() {
        if s == 0.0 {
            continue;
        }
        let kernel = gaussian_kernel(s);
        let radius = (kernel.len() / 2) as isize;

        for mut lane in out.lanes_mut(Axis(axis)) {
            let n = lane.len();
            scratch.clear();
            scratch.extend(lane.iter().copied());

            for i in 0..n {
                let mut acc = 0.0;
                for (k, w) in kernel.iter().enumerate() {
                    let j = i as isize + k as isize - radius;
                    acc += w * scratch[reflect_index(j, n)];
                }
                lane[i] = acc;
            }
        }
    }

    Ok(out)
}
