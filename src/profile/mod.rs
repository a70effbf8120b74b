//! Instrumental profile model and queries.
//!
//! - `model`: builds `InstrumentalProfile` from matched lines and answers
//!   `width_at` on the pixel or wavelength axis
//! - `kernel`: renders normalized line-spread kernels for convolution

pub mod kernel;
pub mod model;

pub use kernel::*;
pub use model::*;
