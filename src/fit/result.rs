//! Fit output for a whole volume.
//!
//! Tensor maps (FA, MD, AD, RD) depend on the eigenvalues only and are filled
//! in when the fit completes. Kurtosis maps (MK, AK, RK) need the rotated
//! kurtosis tensor and elliptic integrals per voxel, so they are computed on
//! request.

use std::borrow::Cow;

use ndarray::Array3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::MapKind;
use crate::models::{
    DkiParams, KurtosisLimits, axial_diffusivity, axial_kurtosis, fractional_anisotropy, mean_diffusivity,
    mean_kurtosis, radial_diffusivity, radial_kurtosis,
};

/// Voxel counts for a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitCounts {
    pub voxels_total: usize,
    pub voxels_in_mask: usize,
    pub voxels_failed: usize,
}

#[derive(Debug, Clone)]
pub struct DkiFit {
    shape: (usize, usize, usize),
    /// Per-voxel parameters in C order; `None` outside the mask or on failure.
    params: Vec<Option<DkiParams>>,
    fa: Array3<f64>,
    md: Array3<f64>,
    ad: Array3<f64>,
    rd: Array3<f64>,
    limits: KurtosisLimits,
    counts: FitCounts,
}

impl DkiFit {
    pub(crate) fn from_params(
        shape: (usize, usize, usize),
        params: Vec<Option<DkiParams>>,
        voxels_in_mask: usize,
        limits: KurtosisLimits,
    ) -> Self {
        let voxels_fit = params.iter().filter(|p| p.is_some()).count();
        let counts = FitCounts {
            voxels_total: params.len(),
            voxels_in_mask,
            voxels_failed: voxels_in_mask.saturating_sub(voxels_fit),
        };

        let mut fit = Self {
            shape,
            params,
            fa: Array3::zeros(shape),
            md: Array3::zeros(shape),
            ad: Array3::zeros(shape),
            rd: Array3::zeros(shape),
            limits,
            counts,
        };
        fit.fa = fit.evaluate(|p| fractional_anisotropy(&p.evals));
        fit.md = fit.evaluate(|p| mean_diffusivity(&p.evals));
        fit.ad = fit.evaluate(|p| axial_diffusivity(&p.evals));
        fit.rd = fit.evaluate(|p| radial_diffusivity(&p.evals));
        fit
    }

    /// Evaluate `f` on every fitted voxel; unfitted voxels are zero.
    fn evaluate<F>(&self, f: F) -> Array3<f64>
    where
        F: Fn(&DkiParams) -> f64 + Sync,
    {
        let values: Vec<f64> = self
            .params
            .par_iter()
            .map(|p| p.as_ref().map_or(0.0, &f))
            .collect();

        let (_, ny, nz) = self.shape;
        Array3::from_shape_fn(self.shape, |(i, j, k)| values[(i * ny + j) * nz + k])
    }

    pub fn counts(&self) -> FitCounts {
        self.counts
    }

    pub fn fa(&self) -> &Array3<f64> {
        &self.fa
    }

    pub fn md(&self) -> &Array3<f64> {
        &self.md
    }

    pub fn ad(&self) -> &Array3<f64> {
        &self.ad
    }

    pub fn rd(&self) -> &Array3<f64> {
        &self.rd
    }

    pub fn mk(&self) -> Array3<f64> {
        let limits = self.limits;
        self.evaluate(|p| mean_kurtosis(p, limits))
    }

    pub fn ak(&self) -> Array3<f64> {
        let limits = self.limits;
        self.evaluate(|p| axial_kurtosis(p, limits))
    }

    pub fn rk(&self) -> Array3<f64> {
        let limits = self.limits;
        self.evaluate(|p| radial_kurtosis(p, limits))
    }

    /// Uniform accessor: borrows precomputed maps, computes kurtosis maps.
    pub fn map(&self, kind: MapKind) -> Cow<'_, Array3<f64>> {
        match kind {
            MapKind::Fa => Cow::Borrowed(&self.fa),
            MapKind::Md => Cow::Borrowed(&self.md),
            MapKind::Ad => Cow::Borrowed(&self.ad),
            MapKind::Rd => Cow::Borrowed(&self.rd),
            MapKind::Mk => Cow::Owned(self.mk()),
            MapKind::Ak => Cow::Owned(self.ak()),
            MapKind::Rk => Cow::Owned(self.rk()),
        }
    }
}
