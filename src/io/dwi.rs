//! Loader: DWI image + gradient files (+ optional mask) into a `Dwi` record.

use std::path::Path;

use log::info;

use crate::domain::Dwi;
use crate::error::AppError;
use crate::io::gradients::read_gradient_table;
use crate::io::nifti::{header_affine, read_mask, read_volume_4d};

/// Load a diffusion-weighted record.
///
/// Shape checks (gradient count vs volumes, mask vs spatial shape) are done by
/// `Dwi::new`.
pub fn load_dwi(
    nifti_path: &Path,
    bval_path: &Path,
    bvec_path: &Path,
    mask_path: Option<&Path>,
) -> Result<Dwi, AppError> {
    let (header, data) = read_volume_4d(nifti_path)?;
    info!("Loaded '{}' with shape {:?}", nifti_path.display(), data.dim());

    let gtab = read_gradient_table(bval_path, bvec_path)?;
    info!(
        "Gradient table: {} entries ({} b0), shells {:?}",
        gtab.len(),
        gtab.b0_count(),
        gtab.shells()
    );

    let mask = match mask_path {
        Some(path) => {
            let mask = read_mask(path)?;
            info!(
                "Loaded mask '{}' ({} voxels set)",
                path.display(),
                mask.iter().filter(|&&m| m).count()
            );
            Some(mask)
        }
        None => None,
    };

    let affine = header_affine(&header);
    Dwi::new(data, gtab, header, affine, mask)
}
