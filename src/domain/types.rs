//! Shared domain types.
//!
//! These types are intentionally small and serializable so they can be:
//!
//! - threaded through the CLI -> fit -> write pipeline
//! - echoed back in the JSON run report

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// A scalar parameter map derived from a kurtosis fit.
///
/// Declaration order is the order maps are computed and written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapKind {
    Fa,
    Md,
    Ad,
    Rd,
    Mk,
    Ak,
    Rk,
}

impl MapKind {
    pub const ALL: [MapKind; 7] = [
        MapKind::Fa,
        MapKind::Md,
        MapKind::Ad,
        MapKind::Rd,
        MapKind::Mk,
        MapKind::Ak,
        MapKind::Rk,
    ];

    /// Short lowercase key, matching the CLI flag name.
    pub fn key(self) -> &'static str {
        match self {
            MapKind::Fa => "fa",
            MapKind::Md => "md",
            MapKind::Ad => "ad",
            MapKind::Rd => "rd",
            MapKind::Mk => "mk",
            MapKind::Ak => "ak",
            MapKind::Rk => "rk",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            MapKind::Fa => "fractional anisotropy",
            MapKind::Md => "mean diffusivity",
            MapKind::Ad => "axial diffusivity",
            MapKind::Rd => "radial diffusivity",
            MapKind::Mk => "mean kurtosis",
            MapKind::Ak => "axial kurtosis",
            MapKind::Rk => "radial kurtosis",
        }
    }
}

/// Destination path per requested map kind.
///
/// Kinds without an entry are skipped entirely (neither computed nor written).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputPaths {
    paths: BTreeMap<MapKind, PathBuf>,
}

impl OutputPaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, kind: MapKind, path: impl Into<PathBuf>) -> Self {
        self.paths.insert(kind, path.into());
        self
    }

    /// Set or clear the destination for `kind`.
    pub fn set(&mut self, kind: MapKind, path: Option<PathBuf>) {
        match path {
            Some(p) => {
                self.paths.insert(kind, p);
            }
            None => {
                self.paths.remove(&kind);
            }
        }
    }

    pub fn get(&self, kind: MapKind) -> Option<&Path> {
        self.paths.get(&kind).map(PathBuf::as_path)
    }

    /// Requested `(kind, path)` pairs in `MapKind::ALL` order.
    pub fn requested(&self) -> impl Iterator<Item = (MapKind, &Path)> {
        self.paths.iter().map(|(k, p)| (*k, p.as_path()))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Estimator used for the per-voxel linear fit of the log signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FitMethod {
    /// Ordinary least squares on the log signal.
    Ols,
    /// OLS followed by a refit weighted by the squared predicted signal.
    #[default]
    Wls,
}

impl FitMethod {
    pub fn display_name(self) -> &'static str {
        match self {
            FitMethod::Ols => "OLS",
            FitMethod::Wls => "WLS",
        }
    }
}

/// Fully resolved configuration for a single run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub nifti_path: PathBuf,
    pub bval_path: PathBuf,
    pub bvec_path: PathBuf,
    pub mask_path: Option<PathBuf>,
    pub blur: bool,
    pub method: FitMethod,
    pub outputs: OutputPaths,
    pub report_path: Option<PathBuf>,
    /// Worker threads for the voxel fit; `None` uses the rayon default.
    pub threads: Option<usize>,
}

impl RunConfig {
    /// Configuration with the positional inputs set and every option at its default.
    pub fn new(
        nifti_path: impl Into<PathBuf>,
        bval_path: impl Into<PathBuf>,
        bvec_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            nifti_path: nifti_path.into(),
            bval_path: bval_path.into(),
            bvec_path: bvec_path.into(),
            mask_path: None,
            blur: false,
            method: FitMethod::default(),
            outputs: OutputPaths::new(),
            report_path: None,
            threads: None,
        }
    }
}
