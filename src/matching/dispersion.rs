//! Pixel → wavelength dispersion solutions.
//!
//! A dispersion solution is a polynomial in a normalized pixel coordinate:
//!
//! ```text
//! λ(x) = Σ c_k u^k,   u = (x - x0) / s
//! ```
//!
//! Normalizing keeps the Vandermonde system well conditioned for detectors with
//! thousands of pixels. The solution is only used to *associate* fitted lines
//! with reference lines and to convert between axes; producing an accurate
//! wavelength calibration is outside the scope of this crate.

use serde::{Deserialize, Serialize};

use nalgebra::{DMatrix, DVector};

use crate::domain::{LineFit, ReferenceLineList};
use crate::error::ProfileError;
use crate::math::solve_least_squares;
use crate::matching::match_lines;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispersion {
    x0: f64,
    scale: f64,
    coefficients: Vec<f64>,
}

impl Dispersion {
    /// Positions are already wavelengths.
    pub fn identity() -> Self {
        Self::linear(0.0, 1.0)
    }

    /// `λ = offset + slope * x`.
    pub fn linear(offset: f64, slope: f64) -> Self {
        Self {
            x0: 0.0,
            scale: 1.0,
            coefficients: vec![offset, slope],
        }
    }

    /// Least-squares polynomial of the given degree through `(pixel, wavelength)` pairs.
    pub fn fit(pixels: &[f64], wavelengths: &[f64], degree: usize) -> Result<Self, ProfileError> {
        if pixels.len() != wavelengths.len() {
            return Err(ProfileError::DispersionUnavailable(format!(
                "pixel/wavelength length mismatch: {} vs {}",
                pixels.len(),
                wavelengths.len()
            )));
        }
        if degree == 0 || pixels.len() < degree + 1 {
            return Err(ProfileError::DispersionUnavailable(format!(
                "degree {degree} needs at least {} pairs, got {}",
                degree.max(1) + 1,
                pixels.len()
            )));
        }
        if pixels.iter().chain(wavelengths).any(|v| !v.is_finite()) {
            return Err(ProfileError::DispersionUnavailable("non-finite pair".to_string()));
        }

        let lo = pixels.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = pixels.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let x0 = 0.5 * (lo + hi);
        let scale = 0.5 * (hi - lo);
        if !(scale > 0.0) {
            return Err(ProfileError::DispersionUnavailable(
                "all anchor pixels coincide".to_string(),
            ));
        }

        let n = pixels.len();
        let mut design = DMatrix::<f64>::zeros(n, degree + 1);
        for (i, &x) in pixels.iter().enumerate() {
            let u = (x - x0) / scale;
            let mut power = 1.0;
            for k in 0..=degree {
                design[(i, k)] = power;
                power *= u;
            }
        }
        let rhs = DVector::from_row_slice(wavelengths);

        let Some(solution) = solve_least_squares(&design, &rhs) else {
            return Err(ProfileError::DispersionUnavailable(
                "ill-conditioned dispersion fit".to_string(),
            ));
        };

        Ok(Self {
            x0,
            scale,
            coefficients: solution.iter().cloned().collect(),
        })
    }

    /// Coarse linear solution from the strongest lines.
    ///
    /// When every reference line carries an intensity, the `anchor_lines`
    /// highest-amplitude fits and the same number of most intense reference
    /// lines are paired in position order and fitted with a straight line.
    ///
    /// Without intensities the reference lines cannot be ranked, so the
    /// solution is searched instead: each pair of anchor fits is tried against
    /// each pair of reference lines, and the straight line that brings the most
    /// fits within `tolerance` of a reference wins (ties go to the smaller
    /// total distance, then to the first candidate). The winner is refitted
    /// through the lines it matches.
    ///
    /// Both variants assume wavelength increases with pixel.
    pub fn coarse_linear(
        fits: &[LineFit],
        references: &ReferenceLineList,
        anchor_lines: usize,
        tolerance: f64,
    ) -> Result<Self, ProfileError> {
        let k = anchor_lines.min(fits.len()).min(references.len());
        if k < 2 {
            return Err(ProfileError::DispersionUnavailable(format!(
                "need at least 2 anchor lines, have {} fits and {} references; \
                 use --dispersion linear or identity for single-line spectra",
                fits.len(),
                references.len()
            )));
        }

        let mut strongest_fits: Vec<&LineFit> = fits.iter().collect();
        strongest_fits.sort_by(|a, b| {
            b.amplitude
                .total_cmp(&a.amplitude)
                .then(a.center.total_cmp(&b.center))
        });
        let mut pixels: Vec<f64> = strongest_fits.iter().take(k).map(|f| f.center).collect();
        pixels.sort_by(|a, b| a.total_cmp(b));

        let intensities: Option<Vec<f64>> = references.lines().iter().map(|l| l.intensity).collect();
        let Some(intensities) = intensities else {
            return Self::search_anchors(fits, references, &pixels, tolerance);
        };

        let mut strongest_refs: Vec<(f64, f64)> = intensities
            .into_iter()
            .zip(references.lines())
            .map(|(intensity, l)| (intensity, l.wavelength))
            .collect();
        strongest_refs.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.total_cmp(&b.1)));
        let mut wavelengths: Vec<f64> = strongest_refs.iter().take(k).map(|r| r.1).collect();
        wavelengths.sort_by(|a, b| a.total_cmp(b));

        Self::fit(&pixels, &wavelengths, 1)
    }

    fn search_anchors(
        fits: &[LineFit],
        references: &ReferenceLineList,
        anchors: &[f64],
        tolerance: f64,
    ) -> Result<Self, ProfileError> {
        let centers: Vec<f64> = fits.iter().map(|f| f.center).collect();
        let wavelengths: Vec<f64> = references.lines().iter().map(|l| l.wavelength).collect();

        let mut best: Option<(usize, f64, Self)> = None;
        for (i, &xa) in anchors.iter().enumerate() {
            for &xb in &anchors[i + 1..] {
                if !(xb > xa) {
                    continue;
                }
                for (a, &la) in wavelengths.iter().enumerate() {
                    for &lb in &wavelengths[a + 1..] {
                        let slope = (lb - la) / (xb - xa);
                        if !(slope > 0.0 && slope.is_finite()) {
                            continue;
                        }
                        let candidate = Self::linear(la - slope * xa, slope);
                        let (count, spread) = candidate.score(&centers, &wavelengths, tolerance);
                        let better = best
                            .as_ref()
                            .is_none_or(|(c, s, _)| count > *c || (count == *c && spread < *s));
                        if better {
                            best = Some((count, spread, candidate));
                        }
                    }
                }
            }
        }

        let Some((count, _, candidate)) = best.filter(|(count, _, _)| *count >= 2) else {
            return Err(ProfileError::DispersionUnavailable(
                "no anchor pairing matches two lines; give reference intensities \
                 or use --dispersion linear"
                    .to_string(),
            ));
        };
        log::debug!("anchor search matched {count} lines with slope {:.6}", candidate.coefficients[1]);

        let matches = match_lines(fits, references, &candidate, tolerance)?;
        let (pixels, wavelengths): (Vec<f64>, Vec<f64>) = matches
            .matched
            .iter()
            .map(|m| (m.fit.center, m.reference.wavelength))
            .unzip();
        Ok(Self::fit(&pixels, &wavelengths, 1).unwrap_or(candidate))
    }

    /// Fits whose predicted wavelength lies within `tolerance` of a reference,
    /// and their summed distance. `wavelengths` must be sorted.
    fn score(&self, centers: &[f64], wavelengths: &[f64], tolerance: f64) -> (usize, f64) {
        let mut count = 0;
        let mut spread = 0.0;
        for &x in centers {
            let predicted = self.wavelength_at(x);
            let j = wavelengths.partition_point(|&l| l < predicted);
            let nearest = [j.checked_sub(1), Some(j)]
                .into_iter()
                .flatten()
                .filter_map(|j| wavelengths.get(j))
                .map(|l| (l - predicted).abs())
                .fold(f64::INFINITY, f64::min);
            if nearest <= tolerance {
                count += 1;
                spread += nearest;
            }
        }
        (count, spread)
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// The same polynomial in raw pixels: `λ = Σ a_k x^k`.
    pub fn pixel_coefficients(&self) -> Vec<f64> {
        let mut out: Vec<f64> = Vec::with_capacity(self.coefficients.len());
        for &c in self.coefficients.iter().rev() {
            // out <- out * (x - x0) / s + c
            let mut next = vec![0.0; out.len() + 1];
            for (k, &a) in out.iter().enumerate() {
                next[k + 1] += a / self.scale;
                next[k] -= a * self.x0 / self.scale;
            }
            next[0] += c;
            out = next;
        }
        out
    }

    pub fn wavelength_at(&self, pixel: f64) -> f64 {
        let u = (pixel - self.x0) / self.scale;
        self.coefficients.iter().rev().fold(0.0, |acc, &c| acc * u + c)
    }

    /// `dλ/dx` at `pixel`.
    pub fn derivative_at(&self, pixel: f64) -> f64 {
        let u = (pixel - self.x0) / self.scale;
        let mut acc = 0.0;
        for (k, &c) in self.coefficients.iter().enumerate().skip(1).rev() {
            acc = acc * u + k as f64 * c;
        }
        acc / self.scale
    }

    /// Convert a width measured in pixels at `pixel` to wavelength units.
    pub fn width_to_wavelength(&self, pixel: f64, width: f64) -> f64 {
        width * self.derivative_at(pixel).abs()
    }
}
