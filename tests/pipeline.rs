//! End-to-end runs: NIfTI + bval/bvec on disk -> fitted maps on disk.

use std::fs;
use std::path::{Path, PathBuf};

use dki_fit::app::pipeline::run_pipeline;
use dki_fit::domain::{MapKind, OutputPaths, RunConfig};
use dki_fit::fit::fit_dki;
use dki_fit::io::load_dwi;
use dki_fit::io::nifti::{header_affine, read_volume};
use ndarray::{Array3, Array4};
use nifti::NiftiHeader;
use nifti::writer::WriterOptions;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn source_header() -> NiftiHeader {
    NiftiHeader {
        sform_code: 2,
        qform_code: 1,
        srow_x: [1.8, 0.0, 0.0, -57.6],
        srow_y: [0.0, 1.8, 0.0, -61.2],
        srow_z: [0.0, 0.0, 2.2, -40.0],
        pixdim: [1.0, 1.8, 1.8, 2.2, 3.1, 1.0, 1.0, 1.0],
        ..NiftiHeader::default()
    }
}

struct Inputs {
    _dir: tempfile::TempDir,
    nifti: PathBuf,
    bval: PathBuf,
    bvec: PathBuf,
    out_dir: PathBuf,
}

/// (4, 4, 4, 3) image with one b0 and two b=1000 volumes along x and y.
fn write_small_inputs() -> Inputs {
    let dir = tempfile::tempdir().unwrap();
    let nifti = dir.path().join("dwi.nii");
    let bval = dir.path().join("dwi.bval");
    let bvec = dir.path().join("dwi.bvec");
    let out_dir = dir.path().join("out");
    fs::create_dir(&out_dir).unwrap();

    let mut rng = StdRng::seed_from_u64(11);
    let data = Array4::from_shape_fn((4, 4, 4, 3), |(_, _, _, t)| {
        let base = [1000.0, 400.0, 550.0][t];
        base * rng.gen_range(0.9f32..1.1)
    });
    WriterOptions::new(&nifti)
        .reference_header(&source_header())
        .write_nifti(&data)
        .unwrap();

    fs::write(&bval, "0 1000 1000\n").unwrap();
    fs::write(&bvec, "0 1 0\n0 0 1\n0 0 0\n").unwrap();

    Inputs {
        _dir: dir,
        nifti,
        bval,
        bvec,
        out_dir,
    }
}

fn files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir).unwrap().map(|e| e.unwrap().path()).collect();
    files.sort();
    files
}

#[test]
fn single_requested_map_writes_exactly_one_file() {
    let inputs = write_small_inputs();
    let md_path = inputs.out_dir.join("out_md.nii");

    let mut config = RunConfig::new(&inputs.nifti, &inputs.bval, &inputs.bvec);
    config.outputs = OutputPaths::new().with(MapKind::Md, &md_path);
    let run = run_pipeline(&config).unwrap();

    assert_eq!(files_in(&inputs.out_dir), vec![md_path.clone()]);
    assert_eq!(run.summary.maps.len(), 1);
    assert_eq!(run.summary.counts.voxels_in_mask, 64);

    let (header, data) = read_volume(&md_path).unwrap();
    assert_eq!(data.shape(), &[4, 4, 4]);
    assert_eq!(header_affine(&header), header_affine(&source_header()));
    assert_eq!(header.sform_code, 2);
    assert_eq!(&header.pixdim[1..4], &source_header().pixdim[1..4]);
    assert!(data.iter().all(|v| v.is_finite()));
}

#[test]
fn fa_and_mk_match_a_fit_over_all_voxels() {
    let inputs = write_small_inputs();
    let fa_path = inputs.out_dir.join("out_fa.nii");
    let mk_path = inputs.out_dir.join("out_mk.nii");

    let mut config = RunConfig::new(&inputs.nifti, &inputs.bval, &inputs.bvec);
    config.outputs = OutputPaths::new().with(MapKind::Mk, &mk_path).with(MapKind::Fa, &fa_path);
    run_pipeline(&config).unwrap();

    assert_eq!(files_in(&inputs.out_dir), vec![fa_path, mk_path.clone()]);

    let dwi = load_dwi(&inputs.nifti, &inputs.bval, &inputs.bvec, None).unwrap();
    let expected = fit_dki(&dwi, false).unwrap().mk();
    let (_, written) = read_volume(&mk_path).unwrap();
    for (got, want) in written.iter().zip(expected.iter()) {
        assert_eq!(*got as f32, *want as f32);
    }
}

#[test]
fn masked_voxels_are_zero_in_every_map() {
    let inputs = write_small_inputs();
    let mask_path = inputs.out_dir.join("mask.nii");
    let mask = Array3::from_shape_fn((4, 4, 4), |(x, _, _)| if x < 2 { 1.0f32 } else { 0.0 });
    WriterOptions::new(&mask_path)
        .reference_header(&source_header())
        .write_nifti(&mask)
        .unwrap();

    let md_path = inputs.out_dir.join("md.nii");
    let mut config = RunConfig::new(&inputs.nifti, &inputs.bval, &inputs.bvec);
    config.mask_path = Some(mask_path);
    config.outputs = OutputPaths::new().with(MapKind::Md, &md_path);
    let run = run_pipeline(&config).unwrap();

    assert_eq!(run.summary.counts.voxels_in_mask, 32);
    assert_eq!(run.summary.maps[0].stats.voxels, 32);
    let (_, md) = read_volume(&md_path).unwrap();
    assert!(md[[3, 0, 0]] == 0.0 && md[[2, 3, 3]] == 0.0);
    assert!(md[[0, 0, 0]] > 0.0 && md[[1, 2, 3]] > 0.0);
}

#[test]
fn blur_changes_the_fit_but_not_the_geometry() {
    let inputs = write_small_inputs();
    let plain = inputs.out_dir.join("md_plain.nii");
    let blurred = inputs.out_dir.join("md_blur.nii");

    let mut config = RunConfig::new(&inputs.nifti, &inputs.bval, &inputs.bvec);
    config.outputs = OutputPaths::new().with(MapKind::Md, &plain);
    run_pipeline(&config).unwrap();

    config.blur = true;
    config.outputs = OutputPaths::new().with(MapKind::Md, &blurred);
    let run = run_pipeline(&config).unwrap();
    assert!(run.summary.blur);

    let (h_plain, a) = read_volume(&plain).unwrap();
    let (h_blur, b) = read_volume(&blurred).unwrap();
    assert_eq!(header_affine(&h_plain), header_affine(&h_blur));
    assert_ne!(a, b);
}

#[test]
fn missing_inputs_fail_with_input_error() {
    let inputs = write_small_inputs();
    let config = RunConfig::new(inputs.out_dir.join("absent.nii"), &inputs.bval, &inputs.bvec);
    assert_eq!(run_pipeline(&config).unwrap_err().exit_code(), 2);

    fs::write(&inputs.bval, "0 1000\n").unwrap();
    let config = RunConfig::new(&inputs.nifti, &inputs.bval, &inputs.bvec);
    assert!(run_pipeline(&config).is_err());
}
