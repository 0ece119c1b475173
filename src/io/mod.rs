//! Input/output helpers.
//!
//! - `.bval` / `.bvec` parsing (`gradients`)
//! - NIfTI read/write with header propagation (`nifti`)
//! - DWI record loading (`dwi`)
//! - metric map export (`export`)
//! - run report JSON read/write (`report`)

pub mod dwi;
pub mod export;
pub mod gradients;
pub mod nifti;
pub mod report;

pub use dwi::*;
pub use export::*;
pub use gradients::*;
pub use report::*;
