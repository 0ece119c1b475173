//! Mathematical utilities: least squares, elliptic integrals and smoothing.

pub mod carlson;
pub mod filter;
pub mod ols;

pub use carlson::*;
pub use filter::*;
pub use ols::*;
