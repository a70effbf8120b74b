//! Sampled line-spread kernels.

use serde::{Deserialize, Serialize};

use crate::domain::ShapeModel;
use crate::error::ProfileError;
use crate::models::{profile, width_from_fwhm};

/// Sampling of a rendered kernel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelOptions {
    /// Kernel half extent, in units of the local FWHM.
    pub half_extent_fwhm: f64,
    /// Samples per FWHM.
    pub samples_per_fwhm: usize,
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self {
            half_extent_fwhm: 3.0,
            samples_per_fwhm: 10,
        }
    }
}

impl KernelOptions {
    pub fn validate(&self) -> Result<(), ProfileError> {
        if !(self.half_extent_fwhm.is_finite() && self.half_extent_fwhm > 0.0) {
            return Err(ProfileError::invalid("half_extent_fwhm", "must be finite and > 0"));
        }
        if self.samples_per_fwhm < 2 {
            return Err(ProfileError::invalid("samples_per_fwhm", "must be >= 2"));
        }
        Ok(())
    }
}

/// A symmetric, area-normalized line-spread kernel.
///
/// `offsets[k] = (k - m) * step` for `k = 0..=2m`; `densities` integrate to one
/// under the trapezoidal rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kernel {
    pub shape: ShapeModel,
    pub fwhm: f64,
    pub step: f64,
    pub offsets: Vec<f64>,
    pub densities: Vec<f64>,
}

impl Kernel {
    /// Render `shape` with the given FWHM (spectrum position units).
    pub fn render(shape: ShapeModel, fwhm: f64, options: &KernelOptions) -> Result<Self, ProfileError> {
        options.validate()?;
        if !(fwhm.is_finite() && fwhm > 0.0) {
            return Err(ProfileError::NonPositiveWidth { width: fwhm });
        }

        let width = width_from_fwhm(shape, fwhm);
        let step = fwhm / options.samples_per_fwhm as f64;
        let half = (options.half_extent_fwhm * options.samples_per_fwhm as f64).floor() as i64;
        let half = half.max(1);

        let offsets: Vec<f64> = (-half..=half).map(|k| k as f64 * step).collect();
        let mut densities: Vec<f64> = offsets.iter().map(|&u| profile(shape, u, width)).collect();

        let area = trapezoid(&densities, step);
        if !(area.is_finite() && area > 0.0) {
            return Err(ProfileError::NonPositiveWidth { width: fwhm });
        }
        for d in &mut densities {
            *d /= area;
        }

        Ok(Self {
            shape,
            fwhm,
            step,
            offsets,
            densities,
        })
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Trapezoidal integral of the densities.
    pub fn integral(&self) -> f64 {
        trapezoid(&self.densities, self.step)
    }

    /// Trapezoid quadrature weights; they sum to one.
    pub fn discrete_weights(&self) -> Vec<f64> {
        let last = self.densities.len().saturating_sub(1);
        self.densities
            .iter()
            .enumerate()
            .map(|(k, &d)| {
                if k == 0 || k == last {
                    0.5 * d * self.step
                } else {
                    d * self.step
                }
            })
            .collect()
    }
}

fn trapezoid(values: &[f64], step: f64) -> f64 {
    match values {
        [] | [_] => 0.0,
        [first, .., last] => step * (values.iter().sum::<f64>() - 0.5 * (first + last)),
    }
}
