//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - loads the DWI record, fits the kurtosis model, writes requested maps
//! - prints the run summary and writes the optional JSON report

use clap::Parser;
use log::{LevelFilter, debug};

use crate::cli::Cli;
use crate::domain::{OutputPaths, RunConfig};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `fit-dki` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = run_config_from_args(&cli);
    debug!("Run configuration: {config:?}");

    let run = match config.threads {
        Some(n) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| AppError::new(4, format!("Failed to build a {n}-thread pool: {e}")))?;
            pool.install(|| pipeline::run_pipeline(&config))?
        }
        None => pipeline::run_pipeline(&config)?,
    };

    println!("{}", crate::report::format_run_summary(&run.summary));

    if let Some(path) = &config.report_path {
        crate::io::report::write_report_json(path, &run.summary)?;
    }

    Ok(())
}

/// `RUST_LOG` wins when set; otherwise `-q`/`-v` pick the level (default warn).
fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        LevelFilter::Error
    } else {
        match cli.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).format_timestamp(None);
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }
    // Ignore an already-installed logger.
    let _ = builder.try_init();
}

pub fn run_config_from_args(cli: &Cli) -> RunConfig {
    let mut outputs = OutputPaths::new();
    for (kind, path) in cli.output_paths() {
        outputs.set(kind, path.cloned());
    }

    RunConfig {
        nifti_path: cli.nifti.clone(),
        bval_path: cli.bval.clone(),
        bvec_path: cli.bvec.clone(),
        mask_path: cli.mask.clone(),
        blur: cli.blur,
        method: cli.method,
        outputs,
        report_path: cli.report.clone(),
        threads: cli.threads,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitMethod, MapKind};
    use std::path::Path;

    #[test]
    fn config_collects_requested_outputs() {
        let cli = Cli::try_parse_from([
            "fit-dki", "dwi.nii", "dwi.bval", "dwi.bvec", "--fa", "fa.nii", "--rk", "rk.nii", "--report", "r.json",
        ])
        .unwrap();
        let config = run_config_from_args(&cli);

        assert_eq!(config.outputs.len(), 2);
        assert_eq!(config.outputs.get(MapKind::Fa), Some(Path::new("fa.nii")));
        assert_eq!(config.outputs.get(MapKind::Rk), Some(Path::new("rk.nii")));
        assert!(config.outputs.get(MapKind::Mk).is_none());
        assert_eq!(config.report_path.as_deref(), Some(Path::new("r.json")));
        assert_eq!(config.method, FitMethod::Wls);
        assert!(!config.blur);
        assert!(config.mask_path.is_none());
    }
}
