//! Command-line parsing for the DKI fitter.
//!
//! Argument parsing stays separate from loading/fitting so the library can be
//! driven from tests with a `RunConfig` directly.

use std::path::PathBuf;

use clap::Parser;

use crate::domain::{FitMethod, MapKind};

/// Fit a diffusion kurtosis model and write scalar maps.
#[derive(Debug, Parser, Clone)]
#[command(name = "fit-dki", version, about = "Diffusion Kurtosis Imaging (DKI) fit")]
pub struct Cli {
    /// Diffusion-weighted image (.nii or .nii.gz).
    #[arg(value_name = "NIFTI")]
    pub nifti: PathBuf,

    /// b-values file.
    #[arg(value_name = "BVAL")]
    pub bval: PathBuf,

    /// b-vectors file.
    #[arg(value_name = "BVEC")]
    pub bvec: PathBuf,

    /// Brain mask image; voxels outside are not fitted.
    #[arg(long, value_name = "PATH")]
    pub mask: Option<PathBuf>,

    /// Smooth in-plane (sigma 0.5 voxel along x and y) before fitting.
    #[arg(long)]
    pub blur: bool,

    /// Fractional anisotropy output.
    #[arg(long, value_name = "PATH")]
    pub fa: Option<PathBuf>,

    /// Mean diffusivity output.
    #[arg(long, value_name = "PATH")]
    pub md: Option<PathBuf>,

    /// Axial diffusivity output.
    #[arg(long, value_name = "PATH")]
    pub ad: Option<PathBuf>,

    /// Radial diffusivity output.
    #[arg(long, value_name = "PATH")]
    pub rd: Option<PathBuf>,

    /// Mean kurtosis output.
    #[arg(long, value_name = "PATH")]
    pub mk: Option<PathBuf>,

    /// Axial kurtosis output.
    #[arg(long, value_name = "PATH")]
    pub ak: Option<PathBuf>,

    /// Radial kurtosis output.
    #[arg(long, value_name = "PATH")]
    pub rk: Option<PathBuf>,

    /// Per-voxel estimator.
    #[arg(long, value_enum, default_value_t = FitMethod::Wls)]
    pub method: FitMethod,

    /// Worker threads for fitting (default: all cores).
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Write a JSON run report.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// More log output (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Requested output path per map kind, in `MapKind::ALL` order.
    pub fn output_paths(&self) -> [(MapKind, Option<&PathBuf>); 7] {
        [
            (MapKind::Fa, self.fa.as_ref()),
            (MapKind::Md, self.md.as_ref()),
            (MapKind::Ad, self.ad.as_ref()),
            (MapKind::Rd, self.rd.as_ref()),
            (MapKind::Mk, self.mk.as_ref()),
            (MapKind::Ak, self.ak.as_ref()),
            (MapKind::Rk, self.rk.as_ref()),
        ]
    }
}
