//! Read/write profile JSON files.
//!
//! A profile file is the portable result of a `measure` run:
//! - the calibration samples and the options needed to rebuild the model
//! - the run configuration and quality report
//! - the matched-line table
//! - a precomputed grid on both axes for quick plotting

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Axis, MatchedLine, ProfileConfig};
use crate::error::{AppError, ProfileError};
use crate::profile::{GridPoint, InstrumentalProfile};
use crate::report::QualityReport;

const GRID_POINTS: usize = 101;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileGrid {
    pub pixel: Vec<GridPoint>,
    pub wavelength: Vec<GridPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileFile {
    pub tool: String,
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub config: ProfileConfig,
    pub profile: InstrumentalProfile,
    pub report: QualityReport,
    pub lines: Vec<MatchedLine>,
    pub grid: ProfileGrid,
}

impl ProfileFile {
    pub fn new(
        config: &ProfileConfig,
        profile: &InstrumentalProfile,
        matched: &[MatchedLine],
        report: &QualityReport,
    ) -> Result<Self, ProfileError> {
        Ok(Self {
            tool: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
            config: config.clone(),
            profile: profile.clone(),
            report: report.clone(),
            lines: matched.to_vec(),
            grid: ProfileGrid {
                pixel: axis_grid(profile, Axis::Pixel)?,
                wavelength: axis_grid(profile, Axis::Wavelength)?,
            },
        })
    }
}

fn axis_grid(profile: &InstrumentalProfile, axis: Axis) -> Result<Vec<GridPoint>, ProfileError> {
    let (lo, hi) = profile.range(axis);
    let n = if hi > lo { GRID_POINTS } else { 1 };
    profile.sample_grid(axis, lo, hi, n)
}

/// Write a profile JSON file.
pub fn write_profile_json(path: &Path, profile_file: &ProfileFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create profile JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, profile_file)
        .map_err(|e| AppError::new(2, format!("Failed to write profile JSON: {e}")))?;
    Ok(())
}

/// Read a profile JSON file; the interpolants are rebuilt from the samples.
pub fn read_profile_json(path: &Path) -> Result<ProfileFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open profile JSON '{}': {e}", path.display())))?;
    let profile_file: ProfileFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid profile JSON: {e}")))?;
    Ok(profile_file)
}
