//! Emission-line detection.
//!
//! Responsibilities:
//!
//! - estimate the continuum baseline and noise level
//! - find local maxima above the detection threshold
//! - suppress maxima closer than the minimum separation
//! - delimit a candidate region around each surviving maximum

pub mod locator;

pub use locator::*;
