//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - output map kinds and their destinations (`MapKind`, `OutputPaths`)
//! - run configuration (`RunConfig`, `FitMethod`)
//! - the loaded diffusion-weighted record (`GradientTable`, `Dwi`)

pub mod dwi;
pub mod types;

pub use dwi::*;
pub use types::*;
