//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - configuration enums (`ShapeKind`, `ExtrapolationPolicy`, `Interpolation`, ...)
//! - the validated input spectrum (`Spectrum`) and reference lines
//! - intermediate products (`CandidateRegion`, `LineFit`, `MatchedLine`)
//! - the run configuration (`ProfileConfig`)

pub mod types;

pub use types::*;
