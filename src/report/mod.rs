//! Reporting utilities: per-map statistics, run summary, and terminal output.

use std::path::PathBuf;

use ndarray::{Array3, Zip};
use serde::{Deserialize, Serialize};

use crate::domain::{Dwi, FitMethod, RunConfig};
use crate::fit::{DkiFit, FitCounts};
use crate::io::export::WrittenMap;

pub mod format;

pub use format::*;

/// Min/mean/max of a map over a set of voxels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapStats {
    pub voxels: usize,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

impl MapStats {
    /// Statistics over voxels where `mask` is true (all voxels without a mask).
    ///
    /// Non-finite values are skipped. An empty selection gives all zeros.
    pub fn over_mask(map: &Array3<f64>, mask: Option<&Array3<bool>>) -> Self {
        let mut acc = StatsAcc::default();
        match mask {
            Some(mask) if mask.dim() == map.dim() => {
                Zip::from(map).and(mask).for_each(|&v, &m| {
                    if m {
                        acc.push(v);
                    }
                });
            }
            _ => map.iter().for_each(|&v| acc.push(v)),
        }
        acc.finish()
    }
}

#[derive(Default)]
struct StatsAcc {
    n: usize,
    sum: f64,
    min: f64,
    max: f64,
}

impl StatsAcc {
    fn push(&mut self, v: f64) {
        if !v.is_finite() {
            return;
        }
        if self.n == 0 {
            self.min = v;
            self.max = v;
        } else {
            self.min = self.min.min(v);
            self.max = self.max.max(v);
        }
        self.n += 1;
        self.sum += v;
    }

    fn finish(self) -> MapStats {
        MapStats {
            voxels: self.n,
            min: self.min,
            mean: if self.n > 0 { self.sum / self.n as f64 } else { 0.0 },
            max: self.max,
        }
    }
}

/// Everything worth reporting about one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub input: PathBuf,
    pub mask: Option<PathBuf>,
    /// `[nx, ny, nz, volumes]`.
    pub shape: [usize; 4],
    pub gradients: usize,
    pub b0_volumes: usize,
    pub shells: Vec<f64>,
    pub blur: bool,
    pub method: FitMethod,
    pub counts: FitCounts,
    pub maps: Vec<WrittenMap>,
}

impl RunSummary {
    pub fn new(config: &RunConfig, dwi: &Dwi, fit: &DkiFit, maps: Vec<WrittenMap>) -> Self {
        let (nx, ny, nz, nt) = dwi.data().dim();
        Self {
            input: config.nifti_path.clone(),
            mask: config.mask_path.clone(),
            shape: [nx, ny, nz, nt],
            gradients: dwi.gtab().len(),
            b0_volumes: dwi.gtab().b0_count(),
            shells: dwi.gtab().shells(),
            blur: config.blur,
            method: config.method,
            counts: fit.counts(),
            maps,
        }
    }
}
