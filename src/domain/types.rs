//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during detection, fitting and matching
//! - exported to JSON/CSV
//! - reloaded later to query a saved profile

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ProfileError;

/// Minimum number of samples a spectrum must carry.
pub const MIN_SPECTRUM_SAMPLES: usize = 3;

/// Line-shape family selected on the command line / in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Gaussian,
    Lorentzian,
    /// Pseudo-Voigt: Gaussian + Lorentzian mixture sharing one FWHM.
    Voigt,
}

/// Concrete line-shape model, including its fixed parameters.
///
/// Every variant is parameterized by a single `width`:
/// - `Gaussian`: standard deviation `σ`
/// - `Lorentzian`: half width at half maximum `γ`
/// - `Voigt`: the Gaussian `σ`; the Lorentzian component uses the same FWHM
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "lowercase")]
pub enum ShapeModel {
    Gaussian,
    Lorentzian,
    Voigt {
        /// Weight of the Lorentzian component, in `[0, 1]`.
        lorentz_fraction: f64,
    },
}

impl ShapeModel {
    pub fn from_kind(kind: ShapeKind, voigt_fraction: f64) -> Self {
        match kind {
            ShapeKind::Gaussian => ShapeModel::Gaussian,
            ShapeKind::Lorentzian => ShapeModel::Lorentzian,
            ShapeKind::Voigt => ShapeModel::Voigt {
                lorentz_fraction: voigt_fraction,
            },
        }
    }

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ShapeModel::Gaussian => "Gaussian",
            ShapeModel::Lorentzian => "Lorentzian",
            ShapeModel::Voigt { .. } => "pseudo-Voigt",
        }
    }
}

/// Behavior of the profile model outside the calibrated range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExtrapolationPolicy {
    /// Hold the nearest edge value.
    Clamp,
    /// Extend the slope of the edge interval (floored at zero).
    Linear,
    /// Reject out-of-range queries with `OutOfRangeQuery`.
    Fail,
}

/// Interpolant used between calibration samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Monotone piecewise cubic Hermite (Fritsch–Carlson); never overshoots.
    Monotone,
    /// Natural cubic spline; smoother, may overshoot between samples.
    Natural,
}

/// Which width statistic the profile model carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProfileMeasure {
    /// The fitted shape parameter (`σ` for Gaussian, `γ` for Lorentzian).
    Width,
    /// Full width at half maximum.
    Fwhm,
}

/// How the pixel → wavelength mapping used for matching is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DispersionMode {
    /// Spectrum positions are already wavelengths.
    Identity,
    /// Use the linear solution given by `dispersion_offset` / `dispersion_slope`.
    Linear,
    /// Derive a coarse linear solution from the strongest lines.
    Auto,
}

/// Coordinate axis of the profile model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Pixel,
    Wavelength,
}

/// A query position on one of the profile axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "axis", content = "value", rename_all = "lowercase")]
pub enum Position {
    Pixel(f64),
    Wavelength(f64),
}

impl Position {
    pub fn axis(self) -> Axis {
        match self {
            Position::Pixel(_) => Axis::Pixel,
            Position::Wavelength(_) => Axis::Wavelength,
        }
    }

    pub fn value(self) -> f64 {
        match self {
            Position::Pixel(v) | Position::Wavelength(v) => v,
        }
    }
}

/// An observed 1-D spectrum: strictly increasing positions and their flux.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    positions: Vec<f64>,
    flux: Vec<f64>,
}

impl Spectrum {
    /// Validate and wrap a spectrum.
    ///
    /// Rejects mismatched lengths, too few samples, non-finite values and
    /// positions that are not strictly increasing.
    pub fn new(positions: Vec<f64>, flux: Vec<f64>) -> Result<Self, ProfileError> {
        if positions.len() != flux.len() {
            return Err(ProfileError::LengthMismatch {
                positions: positions.len(),
                flux: flux.len(),
            });
        }
        if positions.len() < MIN_SPECTRUM_SAMPLES {
            return Err(ProfileError::TooFewSamples {
                actual: positions.len(),
                required: MIN_SPECTRUM_SAMPLES,
            });
        }
        for (index, (&x, &y)) in positions.iter().zip(flux.iter()).enumerate() {
            if !x.is_finite() {
                return Err(ProfileError::NonFinite {
                    what: "position",
                    index,
                    value: x,
                });
            }
            if !y.is_finite() {
                return Err(ProfileError::NonFinite {
                    what: "flux",
                    index,
                    value: y,
                });
            }
        }
        for index in 1..positions.len() {
            if positions[index] <= positions[index - 1] {
                return Err(ProfileError::NonIncreasingPosition {
                    index,
                    previous: positions[index - 1],
                    current: positions[index],
                });
            }
        }
        Ok(Self { positions, flux })
    }

    /// Spectrum indexed by pixel number `0..n`.
    pub fn from_flux(flux: Vec<f64>) -> Result<Self, ProfileError> {
        let positions = (0..flux.len()).map(|i| i as f64).collect();
        Self::new(positions, flux)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    pub fn flux(&self) -> &[f64] {
        &self.flux
    }

    /// Mean sample spacing over `start..end` (falls back to the whole spectrum).
    pub fn mean_spacing(&self, start: usize, end: usize) -> f64 {
        let (start, end) = if end > start + 1 && end <= self.len() {
            (start, end)
        } else {
            (0, self.len())
        };
        (self.positions[end - 1] - self.positions[start]) / (end - start - 1) as f64
    }
}

/// A contiguous sub-range believed to bracket one emission line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateRegion {
    /// First sample index (inclusive).
    pub start: usize,
    /// One past the last sample index.
    pub end: usize,
    /// Index of the local maximum (plateau center for flat tops).
    pub peak_index: usize,
    /// Position of the maximum; the geometric center for plateaus.
    pub peak_position: f64,
    pub peak_flux: f64,
    /// Baseline level the detection threshold was measured against.
    pub baseline: f64,
    /// The region ran into a spectrum edge and was clipped.
    pub boundary_truncated: bool,
}

impl CandidateRegion {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// Result of fitting one candidate region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineFit {
    pub center: f64,
    /// Shape parameter (see `ShapeModel`); always positive.
    pub width: f64,
    pub fwhm: f64,
    /// Peak height above `baseline`.
    pub amplitude: f64,
    pub baseline: f64,
    pub quality: LineFitQuality,
    pub shape: ShapeModel,
    pub region: CandidateRegion,
}

/// Goodness-of-fit diagnostics for a single line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineFitQuality {
    pub sse: f64,
    /// `sse / (n - k)`; the residual variance estimate.
    pub reduced_chi2: f64,
    /// RMS residual divided by the fitted amplitude (scale free).
    pub relative_rms: f64,
    pub n: usize,
    pub iterations: usize,
}

/// A known lamp line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceLine {
    pub wavelength: f64,
    /// Expected relative strength, if known.
    pub intensity: Option<f64>,
    /// Species / identification label (e.g. `"Th I"`).
    pub label: Option<String>,
}

impl ReferenceLine {
    pub fn new(wavelength: f64) -> Self {
        Self {
            wavelength,
            intensity: None,
            label: None,
        }
    }

    pub fn with_intensity(mut self, intensity: f64) -> Self {
        self.intensity = Some(intensity);
        self
    }
}

/// Read-only reference line list, sorted by wavelength.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReferenceLineList {
    lines: Vec<ReferenceLine>,
}

impl ReferenceLineList {
    pub fn new(mut lines: Vec<ReferenceLine>) -> Result<Self, ProfileError> {
        for line in &lines {
            if !line.wavelength.is_finite() {
                return Err(ProfileError::InvalidReferenceList(format!(
                    "non-finite wavelength {}",
                    line.wavelength
                )));
            }
            if let Some(intensity) = line.intensity {
                if !intensity.is_finite() {
                    return Err(ProfileError::InvalidReferenceList(format!(
                        "non-finite intensity for line at {}",
                        line.wavelength
                    )));
                }
            }
        }
        lines.sort_by(|a, b| a.wavelength.total_cmp(&b.wavelength));
        if let Some(pair) = lines.windows(2).find(|w| w[0].wavelength == w[1].wavelength) {
            return Err(ProfileError::InvalidReferenceList(format!(
                "duplicate wavelength {}",
                pair[0].wavelength
            )));
        }
        Ok(Self { lines })
    }

    pub fn from_wavelengths(wavelengths: &[f64]) -> Result<Self, ProfileError> {
        Self::new(wavelengths.iter().map(|&w| ReferenceLine::new(w)).collect())
    }

    pub fn lines(&self) -> &[ReferenceLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A fitted line paired with the reference line it was identified as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedLine {
    pub fit: LineFit,
    pub reference: ReferenceLine,
    /// Wavelength predicted for `fit.center` by the dispersion solution.
    pub predicted_wavelength: f64,
    /// `|predicted_wavelength - reference.wavelength|`.
    pub distance: f64,
}

/// One calibration sample of the profile model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileSample {
    pub pixel: f64,
    pub wavelength: f64,
    /// Width in the spectrum's position units (shape parameter or FWHM).
    pub width: f64,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub shape_model: ShapeKind,
    /// Lorentzian weight of the pseudo-Voigt shape.
    pub voigt_fraction: f64,

    /// Minimum distance (position units) between two distinct peaks.
    pub min_separation: f64,
    /// Minimum peak height above the baseline; `None` = 5 × MAD noise.
    pub detection_threshold: Option<f64>,
    /// Region edges sit where flux falls below this fraction of the peak height.
    pub region_fraction: f64,

    pub max_iterations: usize,
    /// Reject fits whose relative RMS residual exceeds this.
    pub fit_quality_threshold: f64,
    /// Reject fits wider than this (position units, shape parameter).
    pub max_width: Option<f64>,
    /// Allowed center excursion outside the region, in sample spacings.
    pub center_tolerance: f64,

    pub dispersion: DispersionMode,
    pub dispersion_offset: f64,
    pub dispersion_slope: f64,
    /// Number of strongest lines paired for the coarse `auto` dispersion.
    pub anchor_lines: usize,
    /// Matching tolerance in wavelength units.
    pub match_tolerance: f64,

    pub interpolation: Interpolation,
    pub extrapolation_policy: ExtrapolationPolicy,
    pub measure: ProfileMeasure,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            shape_model: ShapeKind::Gaussian,
            voigt_fraction: 0.5,
            min_separation: 5.0,
            detection_threshold: None,
            region_fraction: 0.05,
            max_iterations: 200,
            fit_quality_threshold: 0.05,
            max_width: None,
            center_tolerance: 1.0,
            dispersion: DispersionMode::Auto,
            dispersion_offset: 0.0,
            dispersion_slope: 1.0,
            anchor_lines: 3,
            match_tolerance: 1.0,
            interpolation: Interpolation::Monotone,
            extrapolation_policy: ExtrapolationPolicy::Clamp,
            measure: ProfileMeasure::Width,
        }
    }
}

impl ProfileConfig {
    pub fn shape(&self) -> ShapeModel {
        ShapeModel::from_kind(self.shape_model, self.voigt_fraction)
    }

    /// Check every option against its documented domain.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if !(0.0..=1.0).contains(&self.voigt_fraction) {
            return Err(ProfileError::invalid("voigt_fraction", "must be within [0, 1]"));
        }
        if !(self.min_separation.is_finite() && self.min_separation > 0.0) {
            return Err(ProfileError::invalid("min_separation", "must be finite and > 0"));
        }
        if let Some(threshold) = self.detection_threshold {
            if !threshold.is_finite() {
                return Err(ProfileError::invalid("detection_threshold", "must be finite"));
            }
        }
        if !(self.region_fraction > 0.0 && self.region_fraction < 1.0) {
            return Err(ProfileError::invalid("region_fraction", "must be within (0, 1)"));
        }
        if self.max_iterations == 0 {
            return Err(ProfileError::invalid("max_iterations", "must be >= 1"));
        }
        if !(self.fit_quality_threshold.is_finite() && self.fit_quality_threshold > 0.0) {
            return Err(ProfileError::invalid("fit_quality_threshold", "must be finite and > 0"));
        }
        if let Some(max_width) = self.max_width {
            if !(max_width.is_finite() && max_width > 0.0) {
                return Err(ProfileError::invalid("max_width", "must be finite and > 0"));
            }
        }
        if !(self.center_tolerance.is_finite() && self.center_tolerance >= 0.0) {
            return Err(ProfileError::invalid("center_tolerance", "must be finite and >= 0"));
        }
        if self.dispersion == DispersionMode::Linear
            && !(self.dispersion_slope.is_finite()
                && self.dispersion_slope != 0.0
                && self.dispersion_offset.is_finite())
        {
            return Err(ProfileError::invalid(
                "dispersion_slope",
                "linear dispersion needs a finite offset and a finite, non-zero slope",
            ));
        }
        if self.dispersion == DispersionMode::Auto && self.anchor_lines < 2 {
            return Err(ProfileError::invalid("anchor_lines", "must be >= 2"));
        }
        if !(self.match_tolerance.is_finite() && self.match_tolerance > 0.0) {
            return Err(ProfileError::invalid("match_tolerance", "must be finite and > 0"));
        }
        Ok(())
    }
}
