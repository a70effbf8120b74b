//! Line identification.
//!
//! - `dispersion`: pixel → wavelength solutions used to predict where reference
//!   lines should appear
//! - `matcher`: deterministic one-to-one pairing of fits with reference lines

pub mod dispersion;
pub mod matcher;

pub use dispersion::*;
pub use matcher::*;
