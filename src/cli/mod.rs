//! Command-line parsing for the instrumental profile tool.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! detection/fitting/matching code. Every flag maps onto a `ProfileConfig`
//! field (see `app::profile_config_from_args`).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{DispersionMode, ExtrapolationPolicy, Interpolation, ProfileMeasure, ShapeKind};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "instprofile",
    version,
    about = "Measure a spectrograph's instrumental broadening profile from a calibration lamp spectrum"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Detect, fit and match lamp lines, then build the instrumental profile.
    Measure(MeasureArgs),
    /// Query a saved profile at one position.
    Query(QueryArgs),
    /// Write a seeded synthetic lamp spectrum and its line list.
    Synth(SynthArgs),
}

/// Options for `measure`.
#[derive(Debug, Parser, Clone)]
pub struct MeasureArgs {
    /// Spectrum table (`position,flux` or a single flux column).
    #[arg(long, value_name = "FILE")]
    pub spectrum: PathBuf,

    /// Reference line list (`wavelength[,intensity[,label]]`).
    #[arg(long, value_name = "FILE")]
    pub lines: PathBuf,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Export the profile (samples, report, grid) to JSON.
    #[arg(long = "export-profile", value_name = "JSON")]
    pub export_profile: Option<PathBuf>,

    /// Export the matched-line table to CSV.
    #[arg(long = "export-lines", value_name = "CSV")]
    pub export_lines: Option<PathBuf>,

    /// Print the matched-line table.
    #[arg(long)]
    pub table: bool,
}

/// Pipeline tuning flags.
#[derive(Debug, Args, Clone)]
pub struct ConfigArgs {
    /// Line-shape model fitted to every line.
    #[arg(long, value_enum, default_value_t = ShapeKind::Gaussian)]
    pub shape: ShapeKind,

    /// Lorentzian weight of the pseudo-Voigt shape.
    #[arg(long, default_value_t = 0.5)]
    pub voigt_fraction: f64,

    /// Minimum distance between two distinct peaks (position units).
    #[arg(long, default_value_t = 5.0)]
    pub min_separation: f64,

    /// Minimum peak height above the baseline (default: 5 x MAD noise).
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Region edge as a fraction of the peak height.
    #[arg(long, default_value_t = 0.05)]
    pub region_fraction: f64,

    /// Iteration budget of each line fit.
    #[arg(long, default_value_t = 200)]
    pub max_iterations: usize,

    /// Reject fits whose RMS residual exceeds this fraction of the amplitude.
    #[arg(long, default_value_t = 0.05)]
    pub quality_threshold: f64,

    /// Reject lines wider than this (shape parameter, position units).
    #[arg(long)]
    pub max_width: Option<f64>,

    /// Allowed center excursion outside its region, in samples.
    #[arg(long, default_value_t = 1.0)]
    pub center_tolerance: f64,

    /// How fitted centers are mapped to wavelengths for matching.
    #[arg(long, value_enum, default_value_t = DispersionMode::Auto)]
    pub dispersion: DispersionMode,

    /// Offset of the linear dispersion (`--dispersion linear`).
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub dispersion_offset: f64,

    /// Slope of the linear dispersion (`--dispersion linear`).
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    pub dispersion_slope: f64,

    /// Strongest lines paired for the automatic dispersion.
    #[arg(long, default_value_t = 3)]
    pub anchor_lines: usize,

    /// Matching tolerance (wavelength units).
    #[arg(long, default_value_t = 1.0)]
    pub match_tolerance: f64,

    #[arg(long, value_enum, default_value_t = Interpolation::Monotone)]
    pub interpolation: Interpolation,

    /// Behavior outside the calibrated range.
    #[arg(long, value_enum, default_value_t = ExtrapolationPolicy::Clamp)]
    pub extrapolation: ExtrapolationPolicy,

    /// Quantity carried by the profile.
    #[arg(long, value_enum, default_value_t = ProfileMeasure::Width)]
    pub measure: ProfileMeasure,
}

/// Options for `query`.
#[derive(Debug, Parser)]
pub struct QueryArgs {
    /// Profile JSON written by `measure --export-profile`.
    #[arg(long, value_name = "JSON")]
    pub profile: PathBuf,

    /// Query position in pixels.
    #[arg(
        long,
        conflicts_with = "wavelength",
        required_unless_present = "wavelength",
        allow_negative_numbers = true
    )]
    pub pixel: Option<f64>,

    /// Query position in wavelength units.
    #[arg(long, allow_negative_numbers = true)]
    pub wavelength: Option<f64>,

    /// Also print the normalized kernel.
    #[arg(long)]
    pub kernel: bool,

    /// Kernel half extent in FWHM.
    #[arg(long, default_value_t = 3.0)]
    pub half_extent: f64,

    /// Kernel samples per FWHM.
    #[arg(long, default_value_t = 10)]
    pub samples_per_fwhm: usize,
}

/// Options for `synth`.
#[derive(Debug, Parser)]
pub struct SynthArgs {
    /// Output spectrum CSV.
    #[arg(long, value_name = "FILE")]
    pub out: PathBuf,

    /// Output line list CSV (default: `<out>.lines.csv`).
    #[arg(long, value_name = "FILE")]
    pub lines_out: Option<PathBuf>,

    /// Random seed for line placement and noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Standard deviation of the additive noise.
    #[arg(long, default_value_t = 2.0)]
    pub noise: f64,
}
