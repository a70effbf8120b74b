//! Peak locator.
//!
//! Scans a spectrum for local maxima and brackets each one with a
//! `CandidateRegion` that the line fitter can work on. The result is advisory:
//! the fitter may still reject a region.

use log::debug;

use crate::domain::{CandidateRegion, Spectrum};
use crate::error::ProfileError;
use crate::math::{mad_sigma, median};

/// Default fraction of the peak height at which a region's core ends.
pub const DEFAULT_REGION_FRACTION: f64 = 0.05;

/// Auto thresholds are this many robust noise sigmas above the baseline.
const AUTO_THRESHOLD_SIGMAS: f64 = 5.0;

/// Floor for auto thresholds, relative to the tallest peak (noise-free data).
const AUTO_THRESHOLD_FLOOR: f64 = 1e-3;

/// Peak search settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakSearch {
    /// Minimum distance (position units) between two distinct peaks.
    pub min_separation: f64,
    /// Minimum peak height above the baseline.
    pub threshold: f64,
    /// Region core ends where flux drops below this fraction of the height.
    pub region_fraction: f64,
}

impl PeakSearch {
    pub fn new(min_separation: f64, threshold: f64) -> Self {
        Self {
            min_separation,
            threshold,
            region_fraction: DEFAULT_REGION_FRACTION,
        }
    }

    pub fn with_region_fraction(mut self, fraction: f64) -> Self {
        self.region_fraction = fraction;
        self
    }

    fn validate(&self) -> Result<(), ProfileError> {
        if !(self.min_separation.is_finite() && self.min_separation > 0.0) {
            return Err(ProfileError::invalid("min_separation", "must be finite and > 0"));
        }
        if !self.threshold.is_finite() {
            return Err(ProfileError::invalid("detection_threshold", "must be finite"));
        }
        if !(self.region_fraction > 0.0 && self.region_fraction < 1.0) {
            return Err(ProfileError::invalid("region_fraction", "must be within (0, 1)"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Maximum {
    index: usize,
    position: f64,
    flux: f64,
}

/// Locate candidate line regions with the default region fraction.
pub fn locate(
    spectrum: &Spectrum,
    min_separation: f64,
    threshold: f64,
) -> Result<Vec<CandidateRegion>, ProfileError> {
    locate_with(spectrum, &PeakSearch::new(min_separation, threshold))
}

/// Locate candidate line regions, ordered by position.
pub fn locate_with(spectrum: &Spectrum, search: &PeakSearch) -> Result<Vec<CandidateRegion>, ProfileError> {
    search.validate()?;

    let flux = spectrum.flux();
    let baseline = median(flux).unwrap_or(0.0);

    let maxima = local_maxima(spectrum, baseline, search.threshold);
    let kept = suppress_close(maxima, search.min_separation);
    debug!(
        "peak search: baseline={baseline:.4}, threshold={:.4}, {} maxima kept",
        search.threshold,
        kept.len()
    );

    let mut regions = Vec::with_capacity(kept.len());
    for (k, peak) in kept.iter().enumerate() {
        let lo_limit = if k > 0 {
            (kept[k - 1].index + peak.index).div_ceil(2)
        } else {
            0
        };
        let hi_limit = match kept.get(k + 1) {
            Some(next) => (peak.index + next.index) / 2,
            None => flux.len() - 1,
        };
        regions.push(delimit(spectrum, peak, baseline, search.region_fraction, lo_limit, hi_limit));
    }

    Ok(regions)
}

/// Detection threshold derived from the data: `5 × MAD` noise above the
/// median, floored at a small fraction of the tallest peak.
pub fn auto_threshold(spectrum: &Spectrum) -> f64 {
    let flux = spectrum.flux();
    let baseline = median(flux).unwrap_or(0.0);
    let noise = mad_sigma(flux).unwrap_or(0.0);
    let tallest = flux.iter().cloned().fold(f64::NEG_INFINITY, f64::max) - baseline;
    (AUTO_THRESHOLD_SIGMAS * noise).max(AUTO_THRESHOLD_FLOOR * tallest.max(0.0))
}

/// Local maxima (plateaus collapse to their geometric center) whose height
/// above `baseline` reaches `threshold`.
fn local_maxima(spectrum: &Spectrum, baseline: f64, threshold: f64) -> Vec<Maximum> {
    let flux = spectrum.flux();
    let positions = spectrum.positions();
    let n = flux.len();

    let mut out = Vec::new();
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && flux[j + 1] == flux[i] {
            j += 1;
        }

        let flat_everywhere = i == 0 && j == n - 1;
        let left_lower = i == 0 || flux[i - 1] < flux[i];
        let right_lower = j == n - 1 || flux[j + 1] < flux[i];
        let height = flux[i] - baseline;

        if !flat_everywhere && left_lower && right_lower && height > 0.0 && height >= threshold {
            out.push(Maximum {
                index: (i + j) / 2,
                position: 0.5 * (positions[i] + positions[j]),
                flux: flux[i],
            });
        }
        i = j + 1;
    }
    out
}

/// Keep the tallest maxima first and drop any closer than `min_separation`
/// to one already kept. Output is sorted by position.
fn suppress_close(mut maxima: Vec<Maximum>, min_separation: f64) -> Vec<Maximum> {
    maxima.sort_by(|a, b| b.flux.total_cmp(&a.flux).then(a.index.cmp(&b.index)));

    let mut kept: Vec<Maximum> = Vec::with_capacity(maxima.len());
    for candidate in maxima {
        let isolated = kept
            .iter()
            .all(|k| (k.position - candidate.position).abs() >= min_separation);
        if isolated {
            kept.push(candidate);
        }
    }

    kept.sort_by_key(|m| m.index);
    kept
}

/// Expand around a maximum while flux stays above the cutoff, then pad by half
/// the core width. Never crosses `lo_limit..=hi_limit`.
fn delimit(
    spectrum: &Spectrum,
    peak: &Maximum,
    baseline: f64,
    fraction: f64,
    lo_limit: usize,
    hi_limit: usize,
) -> CandidateRegion {
    let flux = spectrum.flux();
    let n = flux.len();
    let cutoff = baseline + fraction * (peak.flux - baseline);

    let mut left = peak.index;
    while left > lo_limit && flux[left - 1] > cutoff {
        left -= 1;
    }
    let mut right = peak.index;
    while right < hi_limit && flux[right + 1] > cutoff {
        right += 1;
    }

    let boundary_truncated = (left == 0 && flux[0] > cutoff) || (right == n - 1 && flux[n - 1] > cutoff);

    let pad = ((right - left) / 2).max(2);
    let start = left.saturating_sub(pad).max(lo_limit);
    let end = (right + pad).min(hi_limit) + 1;

    CandidateRegion {
        start,
        end,
        peak_index: peak.index,
        peak_position: peak.position,
        peak_flux: peak.flux,
        baseline,
        boundary_truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaussian(x: f64, peak: f64, mean: f64, stdev: f64) -> f64 {
        peak * (-(mean - x).powi(2) / (2.0 * stdev * stdev)).exp()
    }

    fn grid(start: f64, stop: f64, step: f64) -> Vec<f64> {
        let n = ((stop - start) / step).round() as usize;
        (0..n).map(|i| start + i as f64 * step).collect()
    }

    #[test]
    fn finds_narrow_gaussian_on_every_grid_point() {
        let xs = grid(0.0, 100.5, 0.5);
        // The last sample is skipped: a maximum there is only half a line.
        for (k, &mean) in xs.iter().enumerate().take(xs.len() - 1) {
            let ys: Vec<f64> = xs.iter().map(|&x| gaussian(x, 1.0, mean, 0.1)).collect();
            let spectrum = Spectrum::new(xs.clone(), ys).unwrap();
            let regions = locate(&spectrum, 1.0, 0.5).unwrap();
            assert_eq!(regions.len(), 1, "mean={mean}");
            assert_eq!(regions[0].peak_index, k);
            assert_eq!(regions[0].peak_position, mean);
            assert_eq!(regions[0].peak_flux, 1.0);
        }
    }

    #[test]
    fn finds_two_gaussians_in_order() {
        let xs = grid(0.0, 100.5, 0.5);
        let ys: Vec<f64> = xs
            .iter()
            .map(|&x| gaussian(x, 1.5, 25.0, 0.1) + gaussian(x, 2.0, 75.0, 0.05))
            .collect();
        let spectrum = Spectrum::new(xs, ys).unwrap();

        let regions = locate(&spectrum, 1.0, 0.5).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].peak_position, 25.0);
        assert_eq!(regions[0].peak_flux, 1.5);
        assert_eq!(regions[1].peak_position, 75.0);
        assert_eq!(regions[1].peak_flux, 2.0);
    }

    #[test]
    fn plateau_maximum_uses_its_center() {
        let flux = vec![0.0, 0.0, 1.0, 3.0, 3.0, 3.0, 3.0, 1.0, 0.0, 0.0, 0.0];
        let spectrum = Spectrum::from_flux(flux).unwrap();
        let regions = locate(&spectrum, 2.0, 1.0).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].peak_position, 4.5);
        assert_eq!(regions[0].peak_index, 4);
        assert!(!regions[0].boundary_truncated);
    }

    #[test]
    fn edge_line_is_clipped_and_flagged() {
        let ys: Vec<f64> = (0..60).map(|i| gaussian(i as f64, 10.0, 0.0, 3.0)).collect();
        let spectrum = Spectrum::from_flux(ys).unwrap();
        let regions = locate(&spectrum, 3.0, 1.0).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].start, 0);
        assert!(regions[0].boundary_truncated);
    }

    #[test]
    fn close_maxima_are_merged_into_the_taller() {
        // A line with a small secondary bump four pixels away.
        let mut ys: Vec<f64> = (0..80).map(|i| gaussian(i as f64, 10.0, 40.0, 1.0)).collect();
        ys[44] += 2.0;
        let spectrum = Spectrum::from_flux(ys).unwrap();

        let merged = locate(&spectrum, 5.0, 0.5).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].peak_index, 40);

        let split = locate(&spectrum, 1.0, 0.5).unwrap();
        assert_eq!(split.len(), 2);
    }

    #[test]
    fn regions_do_not_cross_neighbouring_peaks() {
        let ys: Vec<f64> = (0..100)
            .map(|i| gaussian(i as f64, 5.0, 40.0, 3.0) + gaussian(i as f64, 5.0, 52.0, 3.0))
            .collect();
        let spectrum = Spectrum::from_flux(ys).unwrap();
        let regions = locate(&spectrum, 4.0, 1.0).unwrap();
        assert_eq!(regions.len(), 2);
        assert!(regions[0].end <= 47, "first region ends at {}", regions[0].end);
        assert!(regions[1].start >= 46, "second region starts at {}", regions[1].start);
    }

    #[test]
    fn threshold_filters_weak_lines() {
        let ys: Vec<f64> = (0..200)
            .map(|i| gaussian(i as f64, 10.0, 50.0, 2.0) + gaussian(i as f64, 0.5, 150.0, 2.0))
            .collect();
        let spectrum = Spectrum::from_flux(ys).unwrap();
        assert_eq!(locate(&spectrum, 5.0, 1.0).unwrap().len(), 1);
        assert_eq!(locate(&spectrum, 5.0, 0.1).unwrap().len(), 2);
    }

    #[test]
    fn flat_spectrum_has_no_peaks() {
        let spectrum = Spectrum::from_flux(vec![1.0; 50]).unwrap();
        assert!(locate(&spectrum, 1.0, 0.0).unwrap().is_empty());
    }

    #[test]
    fn rejects_non_positive_separation() {
        let spectrum = Spectrum::from_flux(vec![0.0, 1.0, 0.0]).unwrap();
        let err = locate(&spectrum, 0.0, 0.5).unwrap_err();
        assert!(matches!(
            err,
            ProfileError::InvalidParameter {
                name: "min_separation",
                ..
            }
        ));
    }

    #[test]
    fn auto_threshold_is_positive_for_noise_free_lines() {
        let ys: Vec<f64> = (0..100).map(|i| gaussian(i as f64, 10.0, 50.0, 2.0)).collect();
        let spectrum = Spectrum::from_flux(ys).unwrap();
        let t = auto_threshold(&spectrum);
        assert!(t > 0.0 && t < 1.0, "threshold={t}");
    }
}
