//! Mathematical utilities: least squares, Levenberg–Marquardt, interpolation
//! and robust statistics.

pub mod interp;
pub mod lm;
pub mod ols;
pub mod stats;

pub use interp::*;
pub use lm::*;
pub use ols::*;
pub use stats::*;
