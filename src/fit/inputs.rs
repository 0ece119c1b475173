//! Preparation of the arrays handed to the voxel fit.
//!
//! - optional in-plane Gaussian blur of the signal
//! - mask resolution: the record's own mask, or every voxel when it has none
//!
//! Both arrays are borrowed from the record whenever they are used unchanged.

use std::borrow::Cow;

use log::debug;
use ndarray::{Array3, Array4};

use crate::domain::Dwi;
use crate::error::AppError;
use crate::math::gaussian_filter;

/// Per-axis Gaussian sigma used by `--blur`: in-plane only, no smoothing across
/// slices or diffusion volumes.
pub const BLUR_SIGMA: [f64; 4] = [0.5, 0.5, 0.0, 0.0];

/// Signal and mask exactly as they are passed to `DkiModel::fit`.
#[derive(Debug)]
pub struct FitInputs<'a> {
    pub data: Cow<'a, Array4<f64>>,
    pub mask: Cow<'a, Array3<bool>>,
}

pub fn prepare_inputs(dwi: &Dwi, blur: bool) -> Result<FitInputs<'_>, AppError> {
    let data = if blur {
        debug!("Blurring signal with sigma {BLUR_SIGMA:?}");
        Cow::Owned(gaussian_filter(dwi.data(), &BLUR_SIGMA)?)
    } else {
        Cow::Borrowed(dwi.data())
    };

    let mask = match dwi.mask() {
        Some(mask) => Cow::Borrowed(mask),
        None => {
            debug!("No mask supplied, fitting every voxel");
            Cow::Owned(Array3::from_elem(dwi.spatial_shape(), true))
        }
    };

    Ok(FitInputs { data, mask })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GradientTable;
    use nalgebra::Matrix4;
    use nifti::NiftiHeader;

    fn record(mask: Option<Array3<bool>>) -> Dwi {
        let data = Array4::from_shape_fn((4, 3, 2, 2), |(x, y, z, t)| (x * 7 + y * 3 + z + t) as f64 + 1.0);
        let gtab = GradientTable::new(vec![0.0, 1000.0], vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]).unwrap();
        Dwi::new(data, gtab, NiftiHeader::default(), Matrix4::identity(), mask).unwrap()
    }

    #[test]
    fn supplied_mask_is_passed_through_unchanged() {
        let mask = Array3::from_shape_fn((4, 3, 2), |(x, y, z)| (x + y + z) % 2 == 0);
        let dwi = record(Some(mask.clone()));
        let inputs = prepare_inputs(&dwi, false).unwrap();

        assert!(matches!(inputs.mask, Cow::Borrowed(_)));
        assert!(std::ptr::eq(&*inputs.mask, dwi.mask().unwrap()));
        assert_eq!(*inputs.mask, mask);
    }

    #[test]
    fn missing_mask_becomes_all_true() {
        let dwi = record(None);
        let inputs = prepare_inputs(&dwi, false).unwrap();
        assert_eq!(inputs.mask.dim(), (4, 3, 2));
        assert!(inputs.mask.iter().all(|&v| v));
    }

    #[test]
    fn data_is_untouched_without_blur() {
        let dwi = record(None);
        let inputs = prepare_inputs(&dwi, false).unwrap();
        assert!(std::ptr::eq(&*inputs.data, dwi.data()));
    }

    #[test]
    fn blur_smooths_in_plane_only() {
        assert_eq!(BLUR_SIGMA, [0.5, 0.5, 0.0, 0.0]);

        let dwi = record(None);
        let inputs = prepare_inputs(&dwi, true).unwrap();
        let expected = gaussian_filter(dwi.data(), &BLUR_SIGMA).unwrap();
        assert_eq!(*inputs.data, expected);
        assert_ne!(*inputs.data, *dwi.data());
    }
}
