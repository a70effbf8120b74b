//! `instprofile` library crate.
//!
//! Measures a spectrograph's instrumental broadening from a calibration lamp
//! spectrum: detect emission lines, fit a line shape to each, identify them
//! against a reference list, and interpolate the fitted widths into a profile
//! that can be queried at any pixel or wavelength.
//!
//! The binary (`instprofile`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - modules are reusable from other reduction pipelines

pub mod app;
pub mod cli;
pub mod data;
pub mod detect;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod matching;
pub mod math;
pub mod models;
pub mod profile;
pub mod report;
