//! JSON run report.
//!
//! The report is the machine-readable counterpart of the terminal summary:
//! inputs, fit counts and per-map statistics, stamped with the generation time.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::report::RunSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFile {
    pub tool: String,
    pub version: String,
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub summary: RunSummary,
}

impl ReportFile {
    pub fn new(summary: RunSummary) -> Self {
        Self {
            tool: "fit-dki".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
            summary,
        }
    }
}

/// Write a run report as pretty JSON.
pub fn write_report_json(path: &Path, summary: &RunSummary) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create report JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, &ReportFile::new(summary.clone()))
        .map_err(|e| AppError::new(2, format!("Failed to write report JSON: {e}")))?;

    Ok(())
}
