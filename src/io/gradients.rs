//! `.bval` / `.bvec` text file parsing.
//!
//! Accepted layouts:
//! - b-values: whitespace-separated numbers, on one row (FSL) or one per line
//! - b-vectors: 3 rows of N values (FSL) or N rows of 3 values; when N == 3 the
//!   FSL row layout is assumed
//!
//! Blank lines and lines starting with `#` are ignored.

use std::fs;
use std::path::Path;

use crate::domain::GradientTable;
use crate::error::AppError;

fn read_text(path: &Path, what: &str) -> Result<String, AppError> {
    fs::read_to_string(path)
        .map_err(|e| AppError::new(2, format!("Failed to read {what} file '{}': {e}", path.display())))
}

fn parse_rows(text: &str, what: &str) -> Result<Vec<Vec<f64>>, AppError> {
    let mut rows = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|tok| !tok.is_empty())
            .map(|tok| {
                tok.parse::<f64>().map_err(|e| {
                    AppError::new(2, format!("Invalid number '{tok}' in {what} on line {}: {e}", idx + 1))
                })
            })
            .collect::<Result<Vec<f64>, AppError>>()?;
        rows.push(row);
    }
    Ok(rows)
}

/// Parse b-values from text.
pub fn parse_bvals(text: &str) -> Result<Vec<f64>, AppError> {
    let values: Vec<f64> = parse_rows(text, "b-values")?.into_iter().flatten().collect();
    if values.is_empty() {
        return Err(AppError::new(2, "b-values file contains no values."));
    }
    Ok(values)
}

/// Parse b-vectors from text.
pub fn parse_bvecs(text: &str) -> Result<Vec<[f64; 3]>, AppError> {
    let rows = parse_rows(text, "b-vectors")?;
    if rows.is_empty() {
        return Err(AppError::new(2, "b-vectors file contains no values."));
    }

    if rows.len() == 3 && rows.iter().all(|r| r.len() == rows[0].len()) {
        let n = rows[0].len();
        return Ok((0..n).map(|i| [rows[0][i], rows[1][i], rows[2][i]]).collect());
    }

    if rows.iter().all(|r| r.len() == 3) {
        return Ok(rows.into_iter().map(|r| [r[0], r[1], r[2]]).collect());
    }

    Err(AppError::new(
        2,
        format!(
            "b-vectors must be 3 rows of N values or N rows of 3 values (got {} rows).",
            rows.len()
        ),
    ))
}

pub fn read_bvals(path: &Path) -> Result<Vec<f64>, AppError> {
    parse_bvals(&read_text(path, "b-values")?)
        .map_err(|e| AppError::new(e.exit_code(), format!("{}: {e}", path.display())))
}

pub fn read_bvecs(path: &Path) -> Result<Vec<[f64; 3]>, AppError> {
    parse_bvecs(&read_text(path, "b-vectors")?)
        .map_err(|e| AppError::new(e.exit_code(), format!("{}: {e}", path.display())))
}

/// Read both files and validate them as a gradient table.
pub fn read_gradient_table(bval_path: &Path, bvec_path: &Path) -> Result<GradientTable, AppError> {
    let bvals = read_bvals(bval_path)?;
    let bvecs = read_bvecs(bvec_path)?;
    GradientTable::new(bvals, bvecs)
}
