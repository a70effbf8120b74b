//! The instrumental profile: width as a smooth function of detector position.
//!
//! An `InstrumentalProfile` is an immutable value built once from matched lines.
//! It carries two interpolants over the same calibration samples, one indexed
//! by pixel and one by wavelength, so callers can query on either axis.
//!
//! Queries outside the sampled range follow the configured
//! `ExtrapolationPolicy`. A profile built from a single distinct sample is
//! constant everywhere and never out of range.

use serde::{Deserialize, Serialize};

use crate::domain::{
    Axis, ExtrapolationPolicy, Interpolation, MatchedLine, Position, ProfileConfig, ProfileMeasure,
    ProfileSample, ShapeModel,
};
use crate::error::ProfileError;
use crate::math::{MonotoneCubic, NaturalSpline};
use crate::models::fwhm;
use crate::profile::{Kernel, KernelOptions};

/// How the profile is built and queried.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileOptions {
    /// Shape the matched lines were fitted with; used to render kernels.
    pub shape: ShapeModel,
    pub interpolation: Interpolation,
    pub extrapolation: ExtrapolationPolicy,
    pub measure: ProfileMeasure,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self::from_config(&ProfileConfig::default())
    }
}

impl ProfileOptions {
    pub fn from_config(config: &ProfileConfig) -> Self {
        Self {
            shape: config.shape(),
            interpolation: config.interpolation,
            extrapolation: config.extrapolation_policy,
            measure: config.measure,
        }
    }
}

/// One `(position, width)` point of a rendered grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub position: f64,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq)]
enum Curve {
    Constant(f64),
    Monotone(MonotoneCubic),
    Natural(NaturalSpline),
}

impl Curve {
    fn boundary_slopes(&self) -> (f64, f64) {
        match self {
            Curve::Constant(_) => (0.0, 0.0),
            Curve::Monotone(c) => c.boundary_slopes(),
            Curve::Natural(c) => c.boundary_slopes(),
        }
    }
}

/// Interpolant over one axis, with what extrapolation needs of its edges.
#[derive(Debug, Clone, PartialEq)]
struct AxisCurve {
    curve: Curve,
    lo: (f64, f64),
    hi: (f64, f64),
    lo_slope: f64,
    hi_slope: f64,
}

impl AxisCurve {
    fn new(mut points: Vec<(f64, f64)>, interpolation: Interpolation) -> Result<Self, ProfileError> {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        // Average samples that share a coordinate.
        let mut xs: Vec<f64> = Vec::with_capacity(points.len());
        let mut ys: Vec<f64> = Vec::with_capacity(points.len());
        let mut i = 0;
        while i < points.len() {
            let x = points[i].0;
            let mut j = i;
            let mut sum = 0.0;
            while j < points.len() && points[j].0 == x {
                sum += points[j].1;
                j += 1;
            }
            xs.push(x);
            ys.push(sum / (j - i) as f64);
            i = j;
        }

        let n = xs.len();
        let Some((&x0, &y0)) = xs.first().zip(ys.first()) else {
            return Err(ProfileError::InsufficientData { usable: 0 });
        };
        if n == 1 {
            return Ok(Self {
                curve: Curve::Constant(y0),
                lo: (x0, y0),
                hi: (x0, y0),
                lo_slope: 0.0,
                hi_slope: 0.0,
            });
        }

        let hi = (xs[n - 1], ys[n - 1]);
        let curve = match interpolation {
            Interpolation::Monotone => MonotoneCubic::new(xs, ys).map(Curve::Monotone),
            Interpolation::Natural => NaturalSpline::new(xs, ys).map(Curve::Natural),
        };
        let Some(curve) = curve else {
            return Err(ProfileError::invalid("samples", "calibration samples must be finite"));
        };
        // Linear extrapolation continues the interpolant's own end slope.
        let (lo_slope, hi_slope) = curve.boundary_slopes();

        Ok(Self {
            curve,
            lo: (x0, y0),
            hi,
            lo_slope,
            hi_slope,
        })
    }

    fn evaluate(&self, x: f64, policy: ExtrapolationPolicy) -> Result<f64, ProfileError> {
        if !x.is_finite() {
            return Err(ProfileError::invalid("position", "query must be finite"));
        }
        let in_range = x >= self.lo.0 && x <= self.hi.0;
        match &self.curve {
            Curve::Constant(y) => return Ok(*y),
            Curve::Monotone(c) if in_range => return Ok(c.evaluate(x)),
            Curve::Natural(c) if in_range => return Ok(c.evaluate(x)),
            _ => {}
        }

        let (edge, slope) = if x < self.lo.0 {
            (self.lo, self.lo_slope)
        } else {
            (self.hi, self.hi_slope)
        };
        match policy {
            ExtrapolationPolicy::Clamp => Ok(edge.1),
            ExtrapolationPolicy::Linear => Ok((edge.1 + slope * (x - edge.0)).max(0.0)),
            ExtrapolationPolicy::Fail => Err(ProfileError::OutOfRangeQuery {
                value: x,
                min: self.lo.0,
                max: self.hi.0,
            }),
        }
    }

    fn range(&self) -> (f64, f64) {
        (self.lo.0, self.hi.0)
    }
}

/// Serialized form: the samples plus the options needed to rebuild the curves.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProfileParts {
    options: ProfileOptions,
    samples: Vec<ProfileSample>,
}

/// Instrumental broadening as a function of detector position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProfileParts", into = "ProfileParts")]
pub struct InstrumentalProfile {
    options: ProfileOptions,
    samples: Vec<ProfileSample>,
    by_pixel: AxisCurve,
    by_wavelength: AxisCurve,
}

impl TryFrom<ProfileParts> for InstrumentalProfile {
    type Error = ProfileError;

    fn try_from(parts: ProfileParts) -> Result<Self, Self::Error> {
        Self::from_samples(parts.samples, parts.options)
    }
}

impl From<InstrumentalProfile> for ProfileParts {
    fn from(profile: InstrumentalProfile) -> Self {
        Self {
            options: profile.options,
            samples: profile.samples,
        }
    }
}

impl InstrumentalProfile {
    /// Build the profile from matched lines.
    ///
    /// Each matched line contributes one sample at its fitted center and
    /// reference wavelength; the sample width is the fitted shape parameter or
    /// the FWHM depending on `options.measure`.
    ///
    /// # Errors
    /// `InsufficientData` when no matched line carries a usable width.
    pub fn build(matched: &[MatchedLine], options: &ProfileOptions) -> Result<Self, ProfileError> {
        let samples: Vec<ProfileSample> = matched
            .iter()
            .map(|m| ProfileSample {
                pixel: m.fit.center,
                wavelength: m.reference.wavelength,
                width: match options.measure {
                    ProfileMeasure::Width => m.fit.width,
                    ProfileMeasure::Fwhm => m.fit.fwhm,
                },
            })
            .filter(|s| usable(s))
            .collect();

        if samples.len() < matched.len() {
            log::warn!(
                "{} matched lines dropped for non-finite or non-positive widths",
                matched.len() - samples.len()
            );
        }
        Self::from_samples(samples, *options)
    }

    /// Rebuild a profile from calibration samples, e.g. after loading them
    /// from disk.
    pub fn from_samples(mut samples: Vec<ProfileSample>, options: ProfileOptions) -> Result<Self, ProfileError> {
        if let Some(bad) = samples.iter().find(|s| !usable(s)) {
            return Err(ProfileError::invalid(
                "samples",
                format!("unusable sample at pixel {} (width {})", bad.pixel, bad.width),
            ));
        }
        if samples.is_empty() {
            return Err(ProfileError::InsufficientData { usable: 0 });
        }
        samples.sort_by(|a, b| a.pixel.total_cmp(&b.pixel).then(a.wavelength.total_cmp(&b.wavelength)));

        let by_pixel = AxisCurve::new(
            samples.iter().map(|s| (s.pixel, s.width)).collect(),
            options.interpolation,
        )?;
        let by_wavelength = AxisCurve::new(
            samples.iter().map(|s| (s.wavelength, s.width)).collect(),
            options.interpolation,
        )?;

        log::info!(
            "instrumental profile built from {} samples (pixel range {:.3}..{:.3})",
            samples.len(),
            by_pixel.range().0,
            by_pixel.range().1
        );

        Ok(Self {
            options,
            samples,
            by_pixel,
            by_wavelength,
        })
    }

    pub fn samples(&self) -> &[ProfileSample] {
        &self.samples
    }

    pub fn options(&self) -> &ProfileOptions {
        &self.options
    }

    pub fn measure(&self) -> ProfileMeasure {
        self.options.measure
    }

    /// Sampled range `(min, max)` on `axis`.
    pub fn range(&self, axis: Axis) -> (f64, f64) {
        self.curve(axis).range()
    }

    fn curve(&self, axis: Axis) -> &AxisCurve {
        match axis {
            Axis::Pixel => &self.by_pixel,
            Axis::Wavelength => &self.by_wavelength,
        }
    }

    /// Instrumental width at `position`, in the spectrum's position units.
    ///
    /// Returns exactly the sample width at a calibration knot.
    pub fn width_at(&self, position: Position) -> Result<f64, ProfileError> {
        self.curve(position.axis())
            .evaluate(position.value(), self.options.extrapolation)
    }

    /// FWHM at `position`, whichever measure the profile carries.
    pub fn fwhm_at(&self, position: Position) -> Result<f64, ProfileError> {
        let value = self.width_at(position)?;
        Ok(match self.options.measure {
            ProfileMeasure::Width => fwhm(self.options.shape, value),
            ProfileMeasure::Fwhm => value,
        })
    }

    /// Area-normalized line-spread kernel at `position`.
    pub fn kernel_at(
        &self,
        position: Position,
        shape: ShapeModel,
        options: &KernelOptions,
    ) -> Result<Kernel, ProfileError> {
        let value = self.width_at(position)?;
        if !(value.is_finite() && value > 0.0) {
            return Err(ProfileError::NonPositiveWidth { width: value });
        }
        // A stored shape parameter is converted through the fitted shape, so
        // the kernel keeps the measured FWHM even if `shape` differs.
        let line_fwhm = match self.options.measure {
            ProfileMeasure::Width => fwhm(self.options.shape, value),
            ProfileMeasure::Fwhm => value,
        };
        Kernel::render(shape, line_fwhm, options)
    }

    /// Evaluate the profile on `n` evenly spaced positions of `axis`.
    pub fn sample_grid(&self, axis: Axis, start: f64, end: f64, n: usize) -> Result<Vec<GridPoint>, ProfileError> {
        if n == 0 {
            return Err(ProfileError::invalid("n", "grid needs at least one point"));
        }
        if !(start.is_finite() && end.is_finite()) {
            return Err(ProfileError::invalid("grid", "bounds must be finite"));
        }
        let curve = self.curve(axis);
        let step = if n > 1 { (end - start) / (n - 1) as f64 } else { 0.0 };
        (0..n)
            .map(|i| {
                // Pin the last point to `end` exactly.
                let position = if n > 1 && i == n - 1 { end } else { start + i as f64 * step };
                Ok(GridPoint {
                    position,
                    width: curve.evaluate(position, self.options.extrapolation)?,
                })
            })
            .collect()
    }
}

fn usable(sample: &ProfileSample) -> bool {
    sample.pixel.is_finite() && sample.wavelength.is_finite() && sample.width.is_finite() && sample.width > 0.0
}
