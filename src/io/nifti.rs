//! NIfTI-1 read/write.
//!
//! Reading goes through `nifti::ReaderOptions` (`.nii` and `.nii.gz`), with the
//! header's intensity scaling applied on conversion to `f64`. Writing uses the
//! source header as reference header so every output map carries the same
//! voxel sizes and units as the input image, with the record's affine stored
//! as the sform.

use std::path::Path;

use log::debug;
use nalgebra::{Matrix3, Matrix4, Vector3};
use ndarray::{Array3, Array4, ArrayD, Axis, Ix3, Ix4};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::error::AppError;

/// Read a NIfTI file as header + `f64` array in `[x, y, z, ...]` order.
pub fn read_volume(path: &Path) -> Result<(NiftiHeader, ArrayD<f64>), AppError> {
    let obj = ReaderOptions::new()
        .read_file(path)
        .map_err(|e| AppError::new(2, format!("Failed to read NIfTI '{}': {e}", path.display())))?;

    let header = obj.header().clone();
    let data = obj
        .into_volume()
        .into_ndarray::<f64>()
        .map_err(|e| AppError::new(2, format!("Failed to convert NIfTI '{}' to an array: {e}", path.display())))?;

    debug!("Read '{}' with shape {:?}", path.display(), data.shape());
    Ok((header, data))
}

/// Read a 4D image; a 3D image is treated as a single volume.
pub fn read_volume_4d(path: &Path) -> Result<(NiftiHeader, Array4<f64>), AppError> {
    let (header, data) = read_volume(path)?;
    let data = match data.ndim() {
        3 => data.insert_axis(Axis(3)),
        4 => data,
        n => {
            return Err(AppError::new(
                2,
                format!("Expected a 3D or 4D image in '{}', got {n}D.", path.display()),
            ));
        }
    };
    let data = data
        .into_dimensionality::<Ix4>()
        .map_err(|e| AppError::new(2, format!("Unexpected image shape in '{}': {e}", path.display())))?;
    Ok((header, data))
}

/// Read a mask image; non-zero voxels are `true`. A singleton 4th axis is dropped.
pub fn read_mask(path: &Path) -> Result<Array3<bool>, AppError> {
    let (_, data) = read_volume(path)?;
    let data = match data.shape() {
        [_, _, _] => data,
        [_, _, _, 1] => data.index_axis_move(Axis(3), 0),
        shape => {
            return Err(AppError::new(
                2,
                format!("Mask '{}' must be 3D, got shape {shape:?}.", path.display()),
            ));
        }
    };
    let data = data
        .into_dimensionality::<Ix3>()
        .map_err(|e| AppError::new(2, format!("Unexpected mask shape in '{}': {e}", path.display())))?;
    Ok(data.mapv(|v| v != 0.0))
}

/// `NIFTI_XFORM_ALIGNED_ANAT`, used when the reference header has no sform.
const SFORM_ALIGNED: i16 = 2;

/// Write a 3D map as `f32` with `affine` as its sform and `reference` for the
/// remaining metadata.
///
/// Intensity scaling is reset so stored values are the map values.
pub fn write_map(
    path: &Path,
    map: &Array3<f64>,
    affine: &Matrix4<f64>,
    reference: &NiftiHeader,
) -> Result<(), AppError> {
    let mut header = reference.clone();
    header.scl_slope = 1.0;
    header.scl_inter = 0.0;

    for (r, row) in [&mut header.srow_x, &mut header.srow_y, &mut header.srow_z]
        .into_iter()
        .enumerate()
    {
        for (c, v) in row.iter_mut().enumerate() {
            *v = affine[(r, c)] as f32;
        }
    }
    if header.sform_code <= 0 {
        header.sform_code = SFORM_ALIGNED;
    }

    let data = map.mapv(|v| v as f32);
    WriterOptions::new(path)
        .reference_header(&header)
        .write_nifti(&data)
        .map_err(|e| AppError::new(2, format!("Failed to write NIfTI '{}': {e}", path.display())))
}

/// Voxel-to-world transform from the header.
///
/// Prefers the sform, then the quaternion qform. Without either, falls back to
/// the scanner-agnostic base affine: voxel sizes with x flipped and the origin
/// at the volume centre.
pub fn header_affine(header: &NiftiHeader) -> Matrix4<f64> {
    let pix = |i: usize| header.pixdim[i] as f64;

    if header.sform_code > 0 {
        let rows = [header.srow_x, header.srow_y, header.srow_z];
        let mut m = Matrix4::identity();
        for (r, row) in rows.iter().enumerate() {
            for c in 0..4 {
                m[(r, c)] = row[c] as f64;
            }
        }
        return m;
    }

    if header.qform_code > 0 {
        let (b, c, d) = (
            header.quatern_b as f64,
            header.quatern_c as f64,
            header.quatern_d as f64,
        );
        let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
        let rot = Matrix3::new(
            a * a + b * b - c * c - d * d,
            2.0 * (b * c - a * d),
            2.0 * (b * d + a * c),
            2.0 * (b * c + a * d),
            a * a + c * c - b * b - d * d,
            2.0 * (c * d - a * b),
            2.0 * (b * d - a * c),
            2.0 * (c * d + a * b),
            a * a + d * d - c * c - b * b,
        );
        let qfac = if pix(0) < 0.0 { -1.0 } else { 1.0 };
        let scaled = rot * Matrix3::from_diagonal(&Vector3::new(pix(1), pix(2), qfac * pix(3)));

        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&scaled);
        m[(0, 3)] = header.quatern_x as f64;
        m[(1, 3)] = header.quatern_y as f64;
        m[(2, 3)] = header.quatern_z as f64;
        return m;
    }

    let zooms = Vector3::new(-pix(1), pix(2), pix(3));
    let mut m = Matrix4::from_diagonal(&zooms.push(1.0));
    for axis in 0..3 {
        let n = header.dim[axis + 1].max(1) as f64;
        m[(axis, 3)] = -zooms[axis] * (n - 1.0) / 2.0;
    }
    m
}
