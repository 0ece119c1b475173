//! Writer: save requested metric maps next to the source image's geometry.
//!
//! Only requested maps are computed. Each map is written as soon as it is
//! available, so a failure part-way leaves the earlier files on disk.

use std::path::PathBuf;

use log::info;
use serde::{Deserialize, Serialize};

use crate::domain::{Dwi, MapKind, OutputPaths};
use crate::error::AppError;
use crate::fit::DkiFit;
use crate::io::nifti::write_map;
use crate::report::MapStats;

/// One map written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrittenMap {
    pub kind: MapKind,
    pub path: PathBuf,
    /// Summary over the fitting mask.
    pub stats: MapStats,
}

/// Write every requested map; returns them in `MapKind::ALL` order.
pub fn save_metric_maps(dwi: &Dwi, fit: &DkiFit, outputs: &OutputPaths) -> Result<Vec<WrittenMap>, AppError> {
    let mut written = Vec::with_capacity(outputs.len());

    for (kind, path) in outputs.requested() {
        let map = fit.map(kind);
        write_map(path, &map, dwi.affine(), dwi.header())?;
        info!("Wrote {} map to '{}'", kind.display_name(), path.display());

        written.push(WrittenMap {
            kind,
            path: path.to_path_buf(),
            stats: MapStats::over_mask(&map, dwi.mask()),
        });
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GradientTable;
    use crate::fit::fit_dki;
    use crate::io::nifti::{header_affine, read_volume};
    use ndarray::Array4;
    use nifti::NiftiHeader;

    fn tiny_dwi() -> Dwi {
        let gtab = GradientTable::new(
            vec![0.0, 1000.0, 1000.0, 1000.0],
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        )
        .unwrap();
        let data = Array4::from_shape_fn((2, 2, 2, 4), |(_, _, _, t)| [100.0, 30.0, 50.0, 60.0][t]);
        let header = NiftiHeader {
            pixdim: [1.0, 1.25, 1.25, 2.0, 1.0, 1.0, 1.0, 1.0],
            ..NiftiHeader::default()
        };
        // The record's affine, not the header's, is what the maps must carry.
        let mut affine = header_affine(&header);
        affine[(1, 3)] = 33.0;
        Dwi::new(data, gtab, header, affine, None).unwrap()
    }

    #[test]
    fn only_requested_maps_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let dwi = tiny_dwi();
        let fit = fit_dki(&dwi, false).unwrap();
        let outputs = OutputPaths::new()
            .with(MapKind::Rd, dir.path().join("rd.nii"))
            .with(MapKind::Fa, dir.path().join("fa.nii"));

        let written = save_metric_maps(&dwi, &fit, &outputs).unwrap();
        assert_eq!(written.iter().map(|w| w.kind).collect::<Vec<_>>(), vec![MapKind::Fa, MapKind::Rd]);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);

        let (header, data) = read_volume(&written[1].path).unwrap();
        assert_eq!(data.shape(), &[2, 2, 2]);
        assert_eq!(header_affine(&header), *dwi.affine());
        assert_ne!(header_affine(dwi.header()), *dwi.affine());
        assert_eq!(data[[1, 1, 1]], fit.rd()[[1, 1, 1]] as f32 as f64);
        assert_eq!(written[0].path, dir.path().join("fa.nii"));
    }

    #[test]
    fn unwritable_path_is_an_io_error() {
        let dwi = tiny_dwi();
        let fit = fit_dki(&dwi, false).unwrap();
        let outputs = OutputPaths::new().with(MapKind::Md, "/nonexistent-dir/md.nii");
        assert_eq!(save_metric_maps(&dwi, &fit, &outputs).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn nothing_requested_writes_nothing() {
        let dwi = tiny_dwi();
        let fit = fit_dki(&dwi, false).unwrap();
        assert!(save_metric_maps(&dwi, &fit, &OutputPaths::new()).unwrap().is_empty());
    }
}
