//! `dki-fit` library crate.
//!
//! Fits a diffusion kurtosis model to a diffusion-weighted NIfTI volume and
//! writes scalar parameter maps (FA, MD, AD, RD, MK, AK, RK).
//!
//! The binary (`fit-dki`) is a thin wrapper around this library so that:
//!
//! - the load -> fit -> write pipeline is testable without spawning processes
//! - the fitting code can be reused on in-memory arrays

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
