//! Diffusion kurtosis model and the scalar maps derived from it.
//!
//! Models are implemented as small, pure functions over per-voxel parameters
//! so that the fitting code can stay generic over voxels.

pub mod dki;
pub mod metrics;

pub use dki::*;
pub use metrics::*;
