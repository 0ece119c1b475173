//! Kurtosis fitting orchestration.
//!
//! Responsibilities:
//!
//! - prepare signal and mask (optional in-plane blur, default mask)
//! - fit each voxel (parallel) with OLS or WLS
//! - expose tensor maps eagerly and kurtosis maps on demand

pub mod fitter;
pub mod inputs;
pub mod result;

pub use fitter::*;
pub use inputs::*;
pub use result::*;
