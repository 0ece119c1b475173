//! Voxel-wise DKI fitting.
//!
//! Given:
//! - a gradient table (fixed for the whole volume)
//! - a 4D signal array and a 3D mask
//!
//! we solve, for each voxel inside the mask:
//! - an OLS problem on the log signal (shared pseudo-inverse)
//! - optionally a WLS refit weighted by the squared predicted signal
//!
//! and turn the coefficients into a decomposed tensor + kurtosis elements.
//! Voxels are independent, so they are evaluated in parallel and collected in
//! index order; the output does not depend on the thread count.

use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array3, Array4, s};
use rayon::prelude::*;

use crate::domain::{Dwi, FitMethod, GradientTable};
use crate::error::AppError;
use crate::fit::inputs::prepare_inputs;
use crate::fit::result::DkiFit;
use crate::math::{pseudo_inverse, solve_weighted_least_squares};
use crate::models::{DkiParams, KurtosisLimits, N_PARAMS, design_matrix};

/// Signal floor applied before taking the log.
pub const MIN_SIGNAL: f64 = 1e-4;

/// A kurtosis model bound to one gradient table.
#[derive(Debug, Clone)]
pub struct DkiModel {
    design: DMatrix<f64>,
    pinv: DMatrix<f64>,
    method: FitMethod,
    limits: KurtosisLimits,
}

impl DkiModel {
    /// Model with the default estimator (WLS).
    pub fn new(gtab: &GradientTable) -> Result<Self, AppError> {
        Self::with_method(gtab, FitMethod::default())
    }

    pub fn with_method(gtab: &GradientTable, method: FitMethod) -> Result<Self, AppError> {
        if gtab.is_empty() {
            return Err(AppError::new(4, "Cannot build a kurtosis model from an empty gradient table."));
        }

        let design = design_matrix(gtab);
        debug!("Design matrix: {}x{}", design.nrows(), design.ncols());
        if design.nrows() < N_PARAMS {
            warn!(
                "Gradient table has {} volumes, fewer than the {N_PARAMS} DKI parameters; the fit is underdetermined.",
                design.nrows()
            );
        }
        if gtab.shells().len() < 2 {
            warn!("Fewer than two non-zero b-shells; kurtosis is poorly constrained.");
        }

        let pinv = pseudo_inverse(&design)
            .ok_or_else(|| AppError::new(4, "Failed to invert the DKI design matrix."))?;

        Ok(Self {
            design,
            pinv,
            method,
            limits: KurtosisLimits::default(),
        })
    }

    pub fn n_volumes(&self) -> usize {
        self.design.nrows()
    }

    /// Fit every voxel where `mask` is true.
    ///
    /// Errors only on shape mismatch; numerical failures leave the voxel unfitted.
    pub fn fit(&self, data: &Array4<f64>, mask: &Array3<bool>) -> Result<DkiFit, AppError> {
        let (nx, ny, nz, nt) = data.dim();
        if nt != self.n_volumes() {
            return Err(AppError::new(
                3,
                format!(
                    "Data has {nt} volumes but the model was built for {}.",
                    self.n_volumes()
                ),
            ));
        }
        if mask.dim() != (nx, ny, nz) {
            return Err(AppError::new(
                3,
                format!(
                    "Mask shape {:?} does not match data spatial shape {:?}.",
                    mask.dim(),
                    (nx, ny, nz)
                ),
            ));
        }

        let n_voxels = nx * ny * nz;
        let params: Vec<Option<DkiParams>> = (0..n_voxels)
            .into_par_iter()
            .map(|flat| {
                let (i, j, k) = (flat / (ny * nz), (flat / nz) % ny, flat % nz);
                if !mask[[i, j, k]] {
                    return None;
                }
                let signal: Vec<f64> = data.slice(s![i, j, k, ..]).to_vec();
                self.fit_signal(&signal)
            })
            .collect();

        let in_mask = mask.iter().filter(|&&m| m).count();
        let fit = DkiFit::from_params((nx, ny, nz), params, in_mask, self.limits);

        let counts = fit.counts();
        info!(
            "Fitted {} of {} masked voxels ({})",
            counts.voxels_in_mask - counts.voxels_failed,
            counts.voxels_in_mask,
            self.method.display_name()
        );
        if counts.voxels_failed > 0 {
            warn!("{} voxels could not be fitted and are set to zero.", counts.voxels_failed);
        }

        Ok(fit)
    }

    /// Fit a single voxel's signal (one value per gradient entry).
    pub fn fit_signal(&self, signal: &[f64]) -> Option<DkiParams> {
        if signal.len() != self.n_volumes() {
            return None;
        }

        let y = DVector::from_iterator(signal.len(), signal.iter().map(|s| s.max(MIN_SIGNAL).ln()));
        let ols = &self.pinv * &y;

        let beta = match self.method {
            FitMethod::Ols => ols,
            FitMethod::Wls => {
                let predicted = &self.design * &ols;
                let w = predicted.map(|v| (2.0 * v).exp());
                solve_weighted_least_squares(&self.design, &y, &w)?
            }
        };

        DkiParams::from_coefficients(&beta)
    }
}

/// Fit a kurtosis model to a loaded record with the default estimator.
pub fn fit_dki(dwi: &Dwi, blur: bool) -> Result<DkiFit, AppError> {
    fit_dki_with_method(dwi, blur, FitMethod::default())
}

/// Fit a kurtosis model to a loaded record.
///
/// The model depends on the gradient table only; the data is optionally
/// blurred in-plane and the record's mask (or an all-true mask) selects voxels.
pub fn fit_dki_with_method(dwi: &Dwi, blur: bool, method: FitMethod) -> Result<DkiFit, AppError> {
    let model = DkiModel::with_method(dwi.gtab(), method)?;
    let inputs = prepare_inputs(dwi, blur)?;
    model.fit(&inputs.data, &inputs.mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{axial_kurtosis, mean_diffusivity, mean_kurtosis};
    use nalgebra::{Matrix3, Matrix4, Rotation3, Vector3};
    use nifti::NiftiHeader;

    fn hemisphere(n: usize) -> Vec<[f64; 3]> {
        let golden = std::f64::consts::PI * (3.0 - 5.0f64.sqrt());
        (0..n)
            .map(|i| {
                let z = 1.0 - (i as f64 + 0.5) / n as f64;
                let r = (1.0 - z * z).sqrt();
                let theta = golden * i as f64;
                [r * theta.cos(), r * theta.sin(), z]
            })
            .collect()
    }

    fn multishell_table() -> GradientTable {
        let dirs = hemisphere(30);
        let mut bvals = vec![0.0, 0.0];
        let mut bvecs = vec![[0.0; 3], [0.0; 3]];
        for b in [1000.0, 2000.0] {
            for d in &dirs {
                bvals.push(b);
                bvecs.push(*d);
            }
        }
        GradientTable::new(bvals, bvecs).unwrap()
    }

    fn truth() -> DkiParams {
        let rot = Rotation3::from_euler_angles(0.2, 0.4, -0.7).into_inner();
        let tensor = rot * Matrix3::from_diagonal(&Vector3::new(1.6e-3, 0.5e-3, 0.35e-3)) * rot.transpose();
        let kt = [0.9, 1.0, 0.8, 0.04, -0.02, 0.03, 0.01, -0.015, 0.02, 0.3, 0.28, 0.33, 0.02, -0.01, 0.015];
        DkiParams::from_tensor(&tensor, kt).unwrap()
    }

    fn synthetic_signal(gtab: &GradientTable, params: &DkiParams, s0: f64) -> Vec<f64> {
        gtab.bvals()
            .iter()
            .zip(gtab.bvecs())
            .map(|(b, g)| params.predict_signal(s0, *b, g))
            .collect()
    }

    #[test]
    fn noise_free_signal_recovers_parameters() {
        let gtab = multishell_table();
        let expected = truth();
        let signal = synthetic_signal(&gtab, &expected, 1000.0);

        for method in [FitMethod::Ols, FitMethod::Wls] {
            let model = DkiModel::with_method(&gtab, method).unwrap();
            let got = model.fit_signal(&signal).unwrap();
            for (a, b) in got.evals.iter().zip(&expected.evals) {
                assert!((a - b).abs() < 1e-9, "{method:?}: evals {:?} vs {:?}", got.evals, expected.evals);
            }
            for (a, b) in got.kt.iter().zip(&expected.kt) {
                assert!((a - b).abs() < 1e-5, "{method:?}: kt {:?} vs {:?}", got.kt, expected.kt);
            }
            let limits = KurtosisLimits::default();
            assert!((mean_kurtosis(&got, limits) - mean_kurtosis(&expected, limits)).abs() < 1e-5);
            assert!((axial_kurtosis(&got, limits) - axial_kurtosis(&expected, limits)).abs() < 1e-5);
        }
    }

    #[test]
    fn noisy_signal_stays_close() {
        use rand::SeedableRng;
        use rand::rngs::StdRng;
        use rand_distr::{Distribution, Normal};

        let gtab = multishell_table();
        let expected = truth();
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(0.0, 2.0).unwrap();
        let signal: Vec<f64> = synthetic_signal(&gtab, &expected, 1000.0)
            .into_iter()
            .map(|s| s + noise.sample(&mut rng))
            .collect();

        let model = DkiModel::new(&gtab).unwrap();
        let got = model.fit_signal(&signal).unwrap();
        let md_true = mean_diffusivity(&expected.evals);
        assert!((mean_diffusivity(&got.evals) - md_true).abs() < 0.05 * md_true);
    }

    #[test]
    fn masked_out_voxels_are_zero_and_fit_is_deterministic() {
        let gtab = multishell_table();
        let signal = synthetic_signal(&gtab, &truth(), 500.0);
        let nt = signal.len();
        let data = Array4::from_shape_fn((3, 2, 2, nt), |(x, _, _, t)| signal[t] * (1.0 + 0.1 * x as f64));
        let mask = Array3::from_shape_fn((3, 2, 2), |(x, y, _)| !(x == 1 && y == 0));

        let model = DkiModel::new(&gtab).unwrap();
        let a = model.fit(&data, &mask).unwrap();
        let b = model.fit(&data, &mask).unwrap();

        assert_eq!(a.md()[[1, 0, 0]], 0.0);
        assert_eq!(a.mk()[[1, 0, 1]], 0.0);
        assert!(a.md()[[1, 1, 0]] > 0.0);
        assert_eq!(a.counts().voxels_in_mask, 10);
        assert_eq!(a.counts().voxels_failed, 0);
        assert_eq!(a.fa(), b.fa());
        assert_eq!(a.mk(), b.mk());
    }

    #[test]
    fn thread_count_does_not_change_the_fit() {
        use rand::SeedableRng;
        use rand::rngs::StdRng;
        use rand_distr::{Distribution, Normal};

        let gtab = multishell_table();
        let signal = synthetic_signal(&gtab, &truth(), 800.0);
        let mut rng = StdRng::seed_from_u64(3);
        let noise = Normal::new(0.0, 4.0).unwrap();
        let data = Array4::from_shape_fn((5, 4, 3, signal.len()), |(_, _, _, t)| signal[t] + noise.sample(&mut rng));
        let mask = Array3::from_shape_fn((5, 4, 3), |(x, y, z)| (x + y + z) % 4 != 0);
        let dwi = Dwi::new(data, gtab, NiftiHeader::default(), Matrix4::identity(), Some(mask)).unwrap();

        let fit_with = |threads: usize| {
            let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build().unwrap();
            pool.install(|| fit_dki(&dwi, true)).unwrap()
        };
        let single = fit_with(1);
        let many = fit_with(4);

        assert_eq!(single.counts(), many.counts());
        assert_eq!(single.fa(), many.fa());
        assert_eq!(single.md(), many.md());
        assert_eq!(single.ad(), many.ad());
        assert_eq!(single.rd(), many.rd());
        assert_eq!(single.mk(), many.mk());
        assert_eq!(single.ak(), many.ak());
        assert_eq!(single.rk(), many.rk());
    }

    #[test]
    fn volume_count_mismatch_is_an_error() {
        let gtab = multishell_table();
        let model = DkiModel::new(&gtab).unwrap();
        let data = Array4::<f64>::ones((2, 2, 2, 5));
        let mask = Array3::from_elem((2, 2, 2), true);
        assert_eq!(model.fit(&data, &mask).unwrap_err().exit_code(), 3);
    }

    #[test]
    fn underdetermined_table_still_fits() {
        let gtab = GradientTable::new(
            vec![0.0, 1000.0, 1000.0],
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        )
        .unwrap();
        let data = Array4::from_shape_fn((2, 2, 2, 3), |(_, _, _, t)| [100.0, 40.0, 60.0][t]);
        let dwi = Dwi::new(data, gtab, NiftiHeader::default(), Matrix4::identity(), None).unwrap();

        let fit = fit_dki(&dwi, false).unwrap();
        assert_eq!(fit.counts().voxels_failed, 0);
        assert!(fit.md().iter().all(|v| v.is_finite()));
        assert!(fit.mk().iter().all(|v| v.is_finite()));
    }
}
