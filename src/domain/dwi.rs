//! The loaded diffusion-weighted record.
//!
//! A `Dwi` is created once by the loader and is read-only afterwards. Its
//! constructor enforces the cross-input invariants:
//!
//! - one gradient table entry per volume along the 4th axis
//! - a mask, when present, covers exactly the three spatial axes

use nalgebra::Matrix4;
use ndarray::{Array3, Array4};
use nifti::NiftiHeader;

use crate::error::AppError;

/// b-values at or below this are treated as unweighted (b0) volumes.
pub const B0_THRESHOLD: f64 = 50.0;

/// Allowed deviation from unit norm for diffusion-weighted b-vectors.
const UNIT_NORM_TOL: f64 = 1e-2;

/// b-values and unit gradient directions, one entry per volume.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientTable {
    bvals: Vec<f64>,
    bvecs: Vec<[f64; 3]>,
}

impl GradientTable {
    pub fn new(bvals: Vec<f64>, bvecs: Vec<[f64; 3]>) -> Result<Self, AppError> {
        if bvals.is_empty() {
            return Err(AppError::new(2, "Gradient table is empty."));
        }
        if bvals.len() != bvecs.len() {
            return Err(AppError::new(
                2,
                format!(
                    "Gradient table mismatch: {} b-values but {} b-vectors.",
                    bvals.len(),
                    bvecs.len()
                ),
            ));
        }

        for (i, (&b, g)) in bvals.iter().zip(&bvecs).enumerate() {
            if !b.is_finite() || b < 0.0 {
                return Err(AppError::new(2, format!("Invalid b-value {b} at index {i}.")));
            }
            if g.iter().any(|v| !v.is_finite()) {
                return Err(AppError::new(2, format!("Non-finite b-vector at index {i}.")));
            }
            if b > B0_THRESHOLD {
                let norm = (g[0] * g[0] + g[1] * g[1] + g[2] * g[2]).sqrt();
                if (norm - 1.0).abs() > UNIT_NORM_TOL {
                    return Err(AppError::new(
                        2,
                        format!("b-vector at index {i} is not unit length (norm={norm:.4}, b={b})."),
                    ));
                }
            }
        }

        Ok(Self { bvals, bvecs })
    }

    pub fn len(&self) -> usize {
        self.bvals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bvals.is_empty()
    }

    pub fn bvals(&self) -> &[f64] {
        &self.bvals
    }

    pub fn bvecs(&self) -> &[[f64; 3]] {
        &self.bvecs
    }

    /// Number of unweighted volumes (`b <= B0_THRESHOLD`).
    pub fn b0_count(&self) -> usize {
        self.bvals.iter().filter(|&&b| b <= B0_THRESHOLD).count()
    }

    /// Distinct diffusion-weighted shells, rounded to the nearest 100 s/mm².
    pub fn shells(&self) -> Vec<f64> {
        let mut shells: Vec<f64> = self
            .bvals
            .iter()
            .filter(|&&b| b > B0_THRESHOLD)
            .map(|b| (b / 100.0).round() * 100.0)
            .collect();
        shells.sort_by(|a, b| a.total_cmp(b));
        shells.dedup();
        shells
    }
}

/// A diffusion-weighted image with its gradient table, spatial metadata and
/// optional brain mask.
#[derive(Debug, Clone)]
pub struct Dwi {
    data: Array4<f64>,
    gtab: GradientTable,
    header: NiftiHeader,
    affine: Matrix4<f64>,
    mask: Option<Array3<bool>>,
}

impl Dwi {
    pub fn new(
        data: Array4<f64>,
        gtab: GradientTable,
        header: NiftiHeader,
        affine: Matrix4<f64>,
        mask: Option<Array3<bool>>,
    ) -> Result<Self, AppError> {
        let (nx, ny, nz, nt) = data.dim();
        if gtab.len() != nt {
            return Err(AppError::new(
                3,
                format!(
                    "Gradient table has {} entries but the image has {nt} volumes.",
                    gtab.len()
                ),
            ));
        }
        if let Some(m) = &mask {
            if m.dim() != (nx, ny, nz) {
                return Err(AppError::new(
                    3,
                    format!(
                        "Mask shape {:?} does not match image spatial shape {:?}.",
                        m.dim(),
                        (nx, ny, nz)
                    ),
                ));
            }
        }

        Ok(Self {
            data,
            gtab,
            header,
            affine,
            mask,
        })
    }

    pub fn data(&self) -> &Array4<f64> {
        &self.data
    }

    pub fn gtab(&self) -> &GradientTable {
        &self.gtab
    }

    pub fn header(&self) -> &NiftiHeader {
        &self.header
    }

    pub fn affine(&self) -> &Matrix4<f64> {
        &self.affine
    }

    pub fn mask(&self) -> Option<&Array3<bool>> {
        self.mask.as_ref()
    }

    pub fn spatial_shape(&self) -> (usize, usize, usize) {
        let (nx, ny, nz, _) = self.data.dim();
        (nx, ny, nz)
    }
}
