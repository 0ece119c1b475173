//! The load -> fit -> write workflow behind the binary.
//!
//! Kept separate from `app::run` so tests can drive a full run from a
//! `RunConfig` without touching argv, logging setup or stdout.

use crate::domain::{Dwi, RunConfig};
use crate::error::AppError;
use crate::fit::{DkiFit, fit_dki_with_method};
use crate::io::dwi::load_dwi;
use crate::io::export::save_metric_maps;
use crate::report::RunSummary;

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub dwi: Dwi,
    pub fit: DkiFit,
    pub summary: RunSummary,
}

/// Execute the full pipeline and return the computed outputs.
pub fn run_pipeline(config: &RunConfig) -> Result<RunOutput, AppError> {
    // 1) Load image, gradients and optional mask.
    let dwi = load_dwi(
        &config.nifti_path,
        &config.bval_path,
        &config.bvec_path,
        config.mask_path.as_deref(),
    )?;

    // 2) Fit (blur and default mask are resolved inside).
    let fit = fit_dki_with_method(&dwi, config.blur, config.method)?;

    // 3) Write requested maps.
    let written = save_metric_maps(&dwi, &fit, &config.outputs)?;

    let summary = RunSummary::new(config, &dwi, &fit, written);
    Ok(RunOutput { dwi, fit, summary })
}
