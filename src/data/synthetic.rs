//! Seeded synthetic lamp spectra.
//!
//! A `SyntheticLamp` describes emission lines on a flat background. Rendering
//! it gives a `Spectrum` indexed by pixel, the matching `ReferenceLineList`
//! (wavelengths from a linear dispersion), and the true line parameters so
//! recovered widths can be checked.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

use crate::domain::{ReferenceLine, ReferenceLineList, ShapeModel, Spectrum};
use crate::error::ProfileError;
use crate::models::predict;

/// One injected emission line (pixel units).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyntheticLine {
    pub center: f64,
    /// Shape parameter of `SyntheticLamp::shape`.
    pub width: f64,
    pub amplitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticLamp {
    pub n_pixels: usize,
    pub background: f64,
    /// Standard deviation of additive Gaussian noise; zero renders a clean spectrum.
    pub noise_sigma: f64,
    pub shape: ShapeModel,
    pub lines: Vec<SyntheticLine>,
    /// `λ = offset + slope * pixel` for the reference list.
    pub dispersion_offset: f64,
    pub dispersion_slope: f64,
}

#[derive(Debug, Clone)]
pub struct SyntheticSpectrum {
    pub spectrum: Spectrum,
    pub references: ReferenceLineList,
    pub truth: Vec<SyntheticLine>,
}

impl SyntheticLamp {
    /// A 2048-pixel lamp whose lines broaden from 1.8 to 3.2 px across the
    /// detector. Line positions and strengths are drawn from `seed`.
    pub fn widening(seed: u64, noise_sigma: f64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let n_pixels = 2048;
        let n_lines = 14;
        let spacing = n_pixels as f64 / (n_lines + 1) as f64;

        let lines = (1..=n_lines)
            .map(|k| {
                let center = k as f64 * spacing + rng.gen_range(-0.3 * spacing..0.3 * spacing);
                let frac = center / n_pixels as f64;
                SyntheticLine {
                    center,
                    width: 1.8 + 1.4 * frac,
                    amplitude: rng.gen_range(200.0..2000.0),
                }
            })
            .collect();

        Self {
            n_pixels,
            background: 20.0,
            noise_sigma,
            shape: ShapeModel::Gaussian,
            lines,
            dispersion_offset: 4000.0,
            dispersion_slope: 0.5,
        }
    }

    pub fn wavelength_at(&self, pixel: f64) -> f64 {
        self.dispersion_offset + self.dispersion_slope * pixel
    }

    /// Render flux, reference list and ground truth.
    pub fn render(&self, seed: u64) -> Result<SyntheticSpectrum, ProfileError> {
        if !(self.noise_sigma.is_finite() && self.noise_sigma >= 0.0) {
            return Err(ProfileError::invalid("noise_sigma", "must be finite and >= 0"));
        }
        let normal = Normal::new(0.0, self.noise_sigma).map_err(|e| ProfileError::invalid("noise_sigma", e.to_string()))?;
        let mut rng = StdRng::seed_from_u64(seed);

        let flux: Vec<f64> = (0..self.n_pixels)
            .map(|i| {
                let x = i as f64;
                let lines: f64 = self
                    .lines
                    .iter()
                    .map(|l| predict(self.shape, x, &[l.amplitude, l.center, l.width, 0.0]))
                    .sum();
                let noise = if self.noise_sigma > 0.0 { normal.sample(&mut rng) } else { 0.0 };
                self.background + lines + noise
            })
            .collect();
        let spectrum = Spectrum::from_flux(flux)?;

        let references = ReferenceLineList::new(
            self.lines
                .iter()
                .map(|l| ReferenceLine {
                    wavelength: self.wavelength_at(l.center),
                    intensity: Some(l.amplitude),
                    label: Some("synthetic".to_string()),
                })
                .collect(),
        )?;

        Ok(SyntheticSpectrum {
            spectrum,
            references,
            truth: self.lines.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_spectrum() {
        let lamp = SyntheticLamp::widening(7, 2.0);
        let a = lamp.render(11).unwrap();
        let b = lamp.render(11).unwrap();
        assert_eq!(a.spectrum, b.spectrum);
        let c = lamp.render(12).unwrap();
        assert_ne!(a.spectrum, c.spectrum);
    }

    #[test]
    fn clean_render_has_background_between_lines() {
        let lamp = SyntheticLamp {
            n_pixels: 200,
            background: 5.0,
            noise_sigma: 0.0,
            shape: ShapeModel::Gaussian,
            lines: vec![SyntheticLine {
                center: 100.0,
                width: 2.0,
                amplitude: 50.0,
            }],
            dispersion_offset: 4000.0,
            dispersion_slope: 1.0,
        };
        let out = lamp.render(0).unwrap();
        assert!((out.spectrum.flux()[100] - 55.0).abs() < 1e-12);
        assert!((out.spectrum.flux()[10] - 5.0).abs() < 1e-12);
        assert_eq!(out.references.lines()[0].wavelength, 4100.0);
    }

    #[test]
    fn widening_lamp_widths_increase_with_pixel() {
        let lamp = SyntheticLamp::widening(3, 0.0);
        let mut lines = lamp.lines.clone();
        lines.sort_by(|a, b| a.center.total_cmp(&b.center));
        assert!(lines.windows(2).all(|w| w[1].width > w[0].width));
        assert!(lines.iter().all(|l| l.center > 0.0 && l.center < 2048.0));
    }

    #[test]
    fn rejects_negative_noise() {
        let mut lamp = SyntheticLamp::widening(1, 0.0);
        lamp.noise_sigma = -1.0;
        assert!(lamp.render(0).is_err());
    }
}
