//! Formatted terminal output.
//!
//! Formatting lives here so the fitting code stays free of presentation
//! concerns and output changes are localized.

use crate::domain::MapKind;
use crate::io::export::WrittenMap;
use crate::report::RunSummary;

/// Format the full run summary (inputs, fit diagnostics, written maps).
pub fn format_run_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    out.push_str("=== fit-dki - Diffusion Kurtosis Fit ===\n");
    out.push_str(&format!("Input: {}\n", summary.input.display()));
    let [nx, ny, nz, nt] = summary.shape;
    out.push_str(&format!("Shape: {nx}x{ny}x{nz} | volumes={nt}\n"));
    out.push_str(&format!(
        "Gradients: n={} | b0={} | shells={}\n",
        summary.gradients,
        summary.b0_volumes,
        fmt_shells(&summary.shells)
    ));
    match &summary.mask {
        Some(path) => out.push_str(&format!("Mask: {}\n", path.display())),
        None => out.push_str("Mask: none (all voxels)\n"),
    }
    out.push_str(&format!(
        "Fit: {} | blur={} | voxels={} | failed={}\n",
        summary.method.display_name(),
        if summary.blur { "on" } else { "off" },
        summary.counts.voxels_in_mask,
        summary.counts.voxels_failed
    ));

    out.push('\n');
    if summary.maps.is_empty() {
        out.push_str("No output maps requested.\n");
    } else {
        out.push_str("Written maps (stats over mask):\n");
        out.push_str(&format_map_table(&summary.maps));
    }

    out
}

/// Format a table of written maps with their statistics.
pub fn format_map_table(maps: &[WrittenMap]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<4} {:>12} {:>12} {:>12} {}\n",
            "map", "min", "mean", "max", "path"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<4} {:-<12} {:-<12} {:-<12} {:-<4}", "", "", "", "", "").trim_end());
    out.push('\n');

    for m in maps {
        out.push_str(
            format!(
                "{:<4} {} {} {} {}",
                m.kind.key(),
                fmt_value(m.kind, m.stats.min),
                fmt_value(m.kind, m.stats.mean),
                fmt_value(m.kind, m.stats.max),
                m.path.display(),
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// Diffusivities are ~1e-3 mm²/s; print them in scientific notation.
fn fmt_value(kind: MapKind, v: f64) -> String {
    match kind {
        MapKind::Md | MapKind::Ad | MapKind::Rd => format!("{v:>12.4e}"),
        _ => format!("{v:>12.4}"),
    }
}

fn fmt_shells(shells: &[f64]) -> String {
    if shells.is_empty() {
        return "none".to_string();
    }
    let parts: Vec<String> = shells.iter().map(|b| format!("{b:.0}")).collect();
    format!("[{}]", parts.join(", "))
}
