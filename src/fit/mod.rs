//! Line profile fitting.
//!
//! Responsibilities:
//!
//! - seed and fit one line-shape model per candidate region (`fitter`)
//! - fit all regions in parallel and collect rejections (`batch`)

pub mod batch;
pub mod fitter;

pub use batch::*;
pub use fitter::*;
