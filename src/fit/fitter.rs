//! Low-level fitting routine for a single candidate region.
//!
//! Given:
//! - the spectrum samples inside the region
//! - a `ShapeModel`
//!
//! we seed `[amplitude, center, width, baseline]` from the data, refine them
//! with Levenberg–Marquardt, and then apply the acceptance rules:
//!
//! - the optimizer must reach a stable residual (`NonConvergence`)
//! - the region must hold at least as many points as free parameters and
//!   yield a positive width (`DegenerateRegion`)
//! - the center must stay inside the region (`CenterOutsideRegion`)
//! - the residual must be small relative to the amplitude, the amplitude
//!   positive and the width below `max_width` (`PoorQuality`)

use nalgebra::{DMatrix, DVector};

use crate::domain::{CandidateRegion, LineFit, LineFitQuality, ProfileConfig, ShapeModel, Spectrum};
use crate::error::{FitFailure, FitFailureReason};
use crate::math::{LmOptions, LmStatus, levenberg_marquardt};
use crate::models::{LINE_PARAMS, fill_jacobian_row, fwhm, predict, width_from_fwhm};

/// Options that affect how each line is fitted and accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFitOptions {
    pub shape: ShapeModel,
    pub max_iterations: usize,
    /// Maximum accepted RMS residual divided by the fitted amplitude.
    pub quality_threshold: f64,
    /// Upper bound on the fitted width parameter, if any.
    pub max_width: Option<f64>,
    /// Allowed center excursion beyond the region edges, in sample spacings.
    pub center_tolerance: f64,
}

impl Default for LineFitOptions {
    fn default() -> Self {
        Self::from_config(&ProfileConfig::default())
    }
}

impl LineFitOptions {
    pub fn from_config(config: &ProfileConfig) -> Self {
        Self {
            shape: config.shape(),
            max_iterations: config.max_iterations,
            quality_threshold: config.fit_quality_threshold,
            max_width: config.max_width,
            center_tolerance: config.center_tolerance,
        }
    }

    pub fn with_shape(mut self, shape: ShapeModel) -> Self {
        self.shape = shape;
        self
    }
}

/// Data-driven starting point for the optimizer.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Seeds {
    amplitude: f64,
    center: f64,
    width: f64,
    baseline: f64,
}

/// Fit one line-shape model to the samples of `region`.
pub fn fit_line(
    spectrum: &Spectrum,
    region: &CandidateRegion,
    options: &LineFitOptions,
) -> Result<LineFit, FitFailure> {
    if region.is_empty() || region.end > spectrum.len() {
        return Err(FitFailure::degenerate(format!(
            "region {}..{} is empty or outside the spectrum ({} samples)",
            region.start,
            region.end,
            spectrum.len()
        )));
    }

    let xs = &spectrum.positions()[region.range()];
    let ys = &spectrum.flux()[region.range()];
    let n = xs.len();
    if n < LINE_PARAMS {
        return Err(FitFailure::degenerate(format!(
            "region holds {n} points, needs at least {LINE_PARAMS}"
        )));
    }

    let seeds = seed_parameters(xs, ys, region, options.shape)?;
    let shape = options.shape;

    let residual = |p: &DVector<f64>| {
        let params = p.as_slice();
        DVector::from_iterator(n, xs.iter().zip(ys).map(|(&x, &y)| y - predict(shape, x, params)))
    };
    let jacobian = |p: &DVector<f64>| {
        let params = p.as_slice();
        let mut jac = DMatrix::zeros(n, LINE_PARAMS);
        let mut row = [0.0; LINE_PARAMS];
        for (i, &x) in xs.iter().enumerate() {
            fill_jacobian_row(shape, x, params, &mut row);
            for (j, value) in row.iter().enumerate() {
                jac[(i, j)] = *value;
            }
        }
        jac
    };
    let admissible = |p: &DVector<f64>| p[2] > 0.0 && p.iter().all(|v| v.is_finite());

    let p0 = DVector::from_row_slice(&[seeds.amplitude, seeds.center, seeds.width, seeds.baseline]);
    let lm_opts = LmOptions {
        max_iterations: options.max_iterations,
        ..LmOptions::default()
    };
    let outcome = levenberg_marquardt(p0, residual, jacobian, admissible, &lm_opts);

    match outcome.status {
        LmStatus::Converged => {}
        LmStatus::MaxIterations => {
            return Err(FitFailure::non_convergence(format!(
                "no stable residual after {} iterations",
                outcome.iterations
            )));
        }
        LmStatus::NonFinite => {
            return Err(FitFailure::non_convergence(format!(
                "non-finite residual after {} iterations",
                outcome.iterations
            )));
        }
    }

    let [amplitude, center, width, baseline] =
        [outcome.params[0], outcome.params[1], outcome.params[2], outcome.params[3]];

    if !(width > 0.0) {
        return Err(FitFailure::degenerate(format!("fitted width {width} is not positive")));
    }

    let tolerance = options.center_tolerance * spectrum.mean_spacing(region.start, region.end);
    if center < xs[0] - tolerance || center > xs[n - 1] + tolerance {
        return Err(FitFailure::new(
            FitFailureReason::CenterOutsideRegion,
            format!(
                "center {center:.4} outside [{:.4}, {:.4}] ± {tolerance:.4}",
                xs[0],
                xs[n - 1]
            ),
        ));
    }

    if !(amplitude > 0.0) {
        return Err(FitFailure::poor_quality(format!(
            "amplitude {amplitude:.4e} is not an emission line"
        )));
    }

    let sse = outcome.sse;
    let relative_rms = (sse / n as f64).sqrt() / amplitude;
    if relative_rms > options.quality_threshold {
        return Err(FitFailure::poor_quality(format!(
            "relative rms {relative_rms:.4} > {:.4}",
            options.quality_threshold
        )));
    }

    if let Some(max_width) = options.max_width {
        if width > max_width {
            return Err(FitFailure::poor_quality(format!("width {width:.4} > max_width {max_width:.4}")));
        }
    }

    let dof = n.saturating_sub(LINE_PARAMS).max(1);
    Ok(LineFit {
        center,
        width,
        fwhm: fwhm(shape, width),
        amplitude,
        baseline,
        quality: LineFitQuality {
            sse,
            reduced_chi2: sse / dof as f64,
            relative_rms,
            n,
            iterations: outcome.iterations,
        },
        shape,
        region: *region,
    })
}

/// Seed the optimizer from the observed samples:
///
/// - baseline: the lower of the two region edge values
/// - amplitude: peak flux minus that baseline
/// - center: the detected peak position
/// - width: half width at half maximum measured in the region, converted to
///   the shape parameter (falls back to half the region extent)
fn seed_parameters(
    xs: &[f64],
    ys: &[f64],
    region: &CandidateRegion,
    shape: ShapeModel,
) -> Result<Seeds, FitFailure> {
    let n = xs.len();
    let baseline = ys[0].min(ys[n - 1]);

    let peak = region
        .peak_index
        .checked_sub(region.start)
        .filter(|&i| i < n)
        .unwrap_or_else(|| argmax(ys));
    let center = if region.peak_index >= region.start && region.peak_index < region.end {
        region.peak_position
    } else {
        xs[peak]
    };

    let amplitude = ys[peak] - baseline;
    if !(amplitude > 0.0) {
        return Err(FitFailure::degenerate(format!(
            "peak flux {:.4} does not rise above the region edges ({baseline:.4})",
            ys[peak]
        )));
    }

    let hwhm = half_width_at_half_max(xs, ys, peak, center, baseline + 0.5 * amplitude)
        .unwrap_or(0.5 * (xs[n - 1] - xs[0]));
    let width = width_from_fwhm(shape, 2.0 * hwhm);
    if !(width > 0.0 && width.is_finite()) {
        return Err(FitFailure::degenerate(format!("estimated width {width} is not positive")));
    }

    Ok(Seeds {
        amplitude,
        center,
        width,
        baseline,
    })
}

fn argmax(ys: &[f64]) -> usize {
    ys.iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Average distance from `center` to the interpolated half-maximum crossings
/// on each side. `None` when neither side crosses inside the region.
fn half_width_at_half_max(xs: &[f64], ys: &[f64], peak: usize, center: f64, half: f64) -> Option<f64> {
    let crossing = |i: usize, j: usize| {
        let t = (half - ys[i]) / (ys[j] - ys[i]);
        xs[i] + t * (xs[j] - xs[i])
    };

    let left = (0..peak)
        .rev()
        .find(|&i| ys[i] <= half)
        .map(|i| center - crossing(i, i + 1));
    let right = (peak + 1..xs.len())
        .find(|&i| ys[i] <= half)
        .map(|i| crossing(i - 1, i) - center);

    let widths: Vec<f64> = [left, right].into_iter().flatten().filter(|w| *w > 0.0).collect();
    if widths.is_empty() {
        None
    } else {
        Some(widths.iter().sum::<f64>() / widths.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::locate;

    fn line_spectrum(shape: ShapeModel, center: f64, width: f64, amplitude: f64, baseline: f64) -> Spectrum {
        let params = [amplitude, center, width, baseline];
        let flux = (0..200).map(|i| predict(shape, i as f64, &params)).collect();
        Spectrum::from_flux(flux).unwrap()
    }

    fn region_around(spectrum: &Spectrum, start: usize, end: usize) -> CandidateRegion {
        let flux = spectrum.flux();
        let peak_index = (start..end).max_by(|&a, &b| flux[a].total_cmp(&flux[b])).unwrap();
        CandidateRegion {
            start,
            end,
            peak_index,
            peak_position: spectrum.positions()[peak_index],
            peak_flux: flux[peak_index],
            baseline: 0.0,
            boundary_truncated: false,
        }
    }

    #[test]
    fn recovers_gaussian_parameters_exactly() {
        let spectrum = line_spectrum(ShapeModel::Gaussian, 100.3, 2.2, 50.0, 3.0);
        let region = region_around(&spectrum, 88, 113);
        let fit = fit_line(&spectrum, &region, &LineFitOptions::default()).unwrap();

        assert!((fit.center - 100.3).abs() < 1e-6, "center={}", fit.center);
        assert!((fit.width - 2.2).abs() / 2.2 < 1e-6, "width={}", fit.width);
        assert!((fit.amplitude - 50.0).abs() < 1e-6);
        assert!((fit.baseline - 3.0).abs() < 1e-6);
        assert!((fit.fwhm - 2.2 * crate::models::FWHM_PER_SIGMA).abs() < 1e-5);
        assert!(fit.quality.relative_rms < 1e-8);
    }

    #[test]
    fn recovers_lorentzian_and_voigt() {
        let voigt = ShapeModel::Voigt {
            lorentz_fraction: 0.4,
        };
        for shape in [ShapeModel::Lorentzian, voigt] {
            let spectrum = line_spectrum(shape, 80.6, 1.8, 20.0, 1.0);
            let region = region_around(&spectrum, 60, 102);
            let options = LineFitOptions::default().with_shape(shape);
            let fit = fit_line(&spectrum, &region, &options).unwrap();
            assert!((fit.center - 80.6).abs() < 1e-6, "{shape:?} center={}", fit.center);
            assert!((fit.width - 1.8).abs() < 1e-5, "{shape:?} width={}", fit.width);
            assert_eq!(fit.shape, shape);
        }
    }

    #[test]
    fn recovers_unit_area_gaussian_on_fine_grid() {
        // Narrow area-normalized Gaussian sampled at 0.01 spacing.
        let step = 0.01;
        let xs: Vec<f64> = (0..10_050).map(|i| i as f64 * step).collect();
        let norm = 1.0 / (2.0 * std::f64::consts::PI * 0.1_f64.powi(2)).sqrt();
        let ys: Vec<f64> = xs
            .iter()
            .map(|&x| norm * (-(50.0 - x).powi(2) / (2.0 * 0.01)).exp())
            .collect();
        let spectrum = Spectrum::new(xs, ys).unwrap();

        let regions = locate(&spectrum, 1.0, 0.5).unwrap();
        assert_eq!(regions.len(), 1);
        let fit = fit_line(&spectrum, &regions[0], &LineFitOptions::default()).unwrap();
        assert!((fit.center - 50.0).abs() < 1e-6);
        assert!((fit.width - 0.1).abs() < 1e-6);
        // Height * σ * sqrt(2π) recovers the unit area.
        let area = fit.amplitude * fit.width * (2.0 * std::f64::consts::PI).sqrt();
        assert!((area - 1.0).abs() < 1e-5, "area={area}");
    }

    #[test]
    fn too_few_points_is_degenerate() {
        let spectrum = line_spectrum(ShapeModel::Gaussian, 100.0, 2.0, 10.0, 0.0);
        let region = region_around(&spectrum, 99, 102);
        let err = fit_line(&spectrum, &region, &LineFitOptions::default()).unwrap_err();
        assert_eq!(err.reason, FitFailureReason::DegenerateRegion);
    }

    #[test]
    fn flat_region_is_degenerate() {
        let spectrum = Spectrum::from_flux(vec![2.0; 40]).unwrap();
        let region = region_around(&spectrum, 5, 25);
        let err = fit_line(&spectrum, &region, &LineFitOptions::default()).unwrap_err();
        assert_eq!(err.reason, FitFailureReason::DegenerateRegion);
    }

    #[test]
    fn wrong_shape_is_poor_quality() {
        // A box-shaped "line" cannot be represented by a Gaussian.
        let mut flux = vec![0.0; 60];
        for v in flux.iter_mut().skip(20).take(20) {
            *v = 10.0;
        }
        let spectrum = Spectrum::from_flux(flux).unwrap();
        let region = CandidateRegion {
            start: 5,
            end: 55,
            peak_index: 30,
            peak_position: 30.0,
            peak_flux: 10.0,
            baseline: 0.0,
            boundary_truncated: false,
        };
        let err = fit_line(&spectrum, &region, &LineFitOptions::default()).unwrap_err();
        assert_eq!(err.reason, FitFailureReason::PoorQuality, "{err}");
    }

    #[test]
    fn max_width_rejects_broad_lines() {
        let spectrum = line_spectrum(ShapeModel::Gaussian, 100.0, 4.0, 10.0, 0.0);
        let region = region_around(&spectrum, 75, 126);
        let options = LineFitOptions {
            max_width: Some(3.0),
            ..LineFitOptions::default()
        };
        let err = fit_line(&spectrum, &region, &options).unwrap_err();
        assert_eq!(err.reason, FitFailureReason::PoorQuality);
        assert!(err.detail.contains("max_width"));
    }

    #[test]
    fn exhausted_iteration_budget_is_non_convergence() {
        let spectrum = line_spectrum(ShapeModel::Gaussian, 100.4, 2.0, 10.0, 0.0);
        let region = region_around(&spectrum, 88, 113);
        let options = LineFitOptions {
            max_iterations: 1,
            ..LineFitOptions::default()
        };
        let err = fit_line(&spectrum, &region, &options).unwrap_err();
        assert_eq!(err.reason, FitFailureReason::NonConvergence);
    }
}
