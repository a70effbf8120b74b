//! One-to-one association of fitted lines with reference lines.

use serde::{Deserialize, Serialize};

use crate::domain::{LineFit, MatchedLine, ReferenceLineList};
use crate::error::ProfileError;
use crate::matching::Dispersion;

/// Result of a matching pass.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchOutcome {
    /// Sorted by fitted center.
    pub matched: Vec<MatchedLine>,
    pub unmatched_fits: usize,
    pub unmatched_references: usize,
}

/// Pair every fit with at most one reference line and vice versa.
///
/// Candidate pairs are all `(fit, reference)` combinations whose predicted
/// wavelength lies within `tolerance` of the reference. Pairs are accepted
/// greedily in order of increasing distance; ties go to the lower fit index,
/// then to the lower reference index. The result depends only on the inputs.
///
/// # Arguments
/// - `fits`: accepted line fits (any order)
/// - `references`: reference lines, sorted by wavelength
/// - `dispersion`: maps fitted centers to wavelengths
/// - `tolerance`: maximum allowed `|predicted - reference|`, in wavelength units
pub fn match_lines(
    fits: &[LineFit],
    references: &ReferenceLineList,
    dispersion: &Dispersion,
    tolerance: f64,
) -> Result<MatchOutcome, ProfileError> {
    if !(tolerance.is_finite() && tolerance > 0.0) {
        return Err(ProfileError::invalid("match_tolerance", "must be finite and > 0"));
    }

    let lines = references.lines();
    let predicted: Vec<f64> = fits.iter().map(|f| dispersion.wavelength_at(f.center)).collect();

    let mut pairs: Vec<(f64, usize, usize)> = Vec::new();
    for (i, &lambda) in predicted.iter().enumerate() {
        if !lambda.is_finite() {
            continue;
        }
        let lo = lines.partition_point(|l| l.wavelength < lambda - tolerance);
        for (j, line) in lines.iter().enumerate().skip(lo) {
            let distance = (lambda - line.wavelength).abs();
            if line.wavelength > lambda + tolerance {
                break;
            }
            if distance <= tolerance {
                pairs.push((distance, i, j));
            }
        }
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut fit_taken = vec![false; fits.len()];
    let mut ref_taken = vec![false; lines.len()];
    let mut matched = Vec::new();
    for (distance, i, j) in pairs {
        if fit_taken[i] || ref_taken[j] {
            continue;
        }
        fit_taken[i] = true;
        ref_taken[j] = true;
        matched.push(MatchedLine {
            fit: fits[i].clone(),
            reference: lines[j].clone(),
            predicted_wavelength: predicted[i],
            distance,
        });
    }
    matched.sort_by(|a, b| {
        a.fit
            .center
            .total_cmp(&b.fit.center)
            .then(a.reference.wavelength.total_cmp(&b.reference.wavelength))
    });

    let outcome = MatchOutcome {
        unmatched_fits: fits.len() - matched.len(),
        unmatched_references: lines.len() - matched.len(),
        matched,
    };
    log::debug!(
        "matched {} lines ({} fits and {} references unmatched, tolerance {tolerance})",
        outcome.matched.len(),
        outcome.unmatched_fits,
        outcome.unmatched_references
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CandidateRegion, LineFitQuality, ShapeModel};

    fn fit_at(center: f64) -> LineFit {
        LineFit {
            center,
            width: 2.0,
            fwhm: 4.7,
            amplitude: 10.0,
            baseline: 0.0,
            quality: LineFitQuality {
                sse: 0.0,
                reduced_chi2: 0.0,
                relative_rms: 0.0,
                n: 10,
                iterations: 3,
            },
            shape: ShapeModel::Gaussian,
            region: CandidateRegion {
                start: 0,
                end: 10,
                peak_index: 5,
                peak_position: center,
                peak_flux: 10.0,
                baseline: 0.0,
                boundary_truncated: false,
            },
        }
    }

    #[test]
    fn matches_within_tolerance() {
        let fits = vec![fit_at(100.2), fit_at(500.0), fit_at(700.0)];
        let refs = ReferenceLineList::from_wavelengths(&[100.0, 499.5, 900.0]).unwrap();
        let out = match_lines(&fits, &refs, &Dispersion::identity(), 1.0).unwrap();

        assert_eq!(out.matched.len(), 2);
        assert_eq!(out.matched[0].reference.wavelength, 100.0);
        assert!((out.matched[0].distance - 0.2).abs() < 1e-9);
        assert_eq!(out.matched[1].reference.wavelength, 499.5);
        assert_eq!(out.unmatched_fits, 1);
        assert_eq!(out.unmatched_references, 1);
    }

    #[test]
    fn closest_fit_wins_a_contested_reference() {
        let fits = vec![fit_at(99.4), fit_at(100.3)];
        let refs = ReferenceLineList::from_wavelengths(&[100.0]).unwrap();
        let out = match_lines(&fits, &refs, &Dispersion::identity(), 1.0).unwrap();

        assert_eq!(out.matched.len(), 1);
        assert_eq!(out.matched[0].fit.center, 100.3);
        assert_eq!(out.unmatched_fits, 1);
    }

    #[test]
    fn pairing_is_one_to_one() {
        let fits = vec![fit_at(10.0), fit_at(10.5), fit_at(11.0)];
        let refs = ReferenceLineList::from_wavelengths(&[10.2, 10.9]).unwrap();
        let out = match_lines(&fits, &refs, &Dispersion::identity(), 1.0).unwrap();

        assert_eq!(out.matched.len(), 2);
        let mut seen: Vec<f64> = out.matched.iter().map(|m| m.reference.wavelength).collect();
        seen.dedup();
        assert_eq!(seen.len(), 2);
        let centers: Vec<f64> = out.matched.iter().map(|m| m.fit.center).collect();
        assert_eq!(centers, vec![10.0, 11.0]);
    }

    #[test]
    fn equal_distances_prefer_lower_fit_index() {
        let fits = vec![fit_at(9.5), fit_at(10.5)];
        let refs = ReferenceLineList::from_wavelengths(&[10.0]).unwrap();
        let out = match_lines(&fits, &refs, &Dispersion::identity(), 1.0).unwrap();
        assert_eq!(out.matched[0].fit.center, 9.5);
    }

    #[test]
    fn matching_is_deterministic_and_idempotent() {
        let fits: Vec<LineFit> = (0..40).map(|i| fit_at(i as f64 * 2.5 + 0.3)).collect();
        let refs =
            ReferenceLineList::from_wavelengths(&(0..50).map(|i| 4000.0 + i as f64 * 3.1).collect::<Vec<_>>())
                .unwrap();
        let dispersion = Dispersion::linear(4000.0, 1.24);

        let first = match_lines(&fits, &refs, &dispersion, 1.5).unwrap();
        let second = match_lines(&fits, &refs, &dispersion, 1.5).unwrap();
        assert_eq!(first, second);

        let again: Vec<LineFit> = first.matched.iter().map(|m| m.fit.clone()).collect();
        let rematched = match_lines(&again, &refs, &dispersion, 1.5).unwrap();
        assert_eq!(rematched.matched, first.matched);
    }

    #[test]
    fn rejects_non_positive_tolerance() {
        let refs = ReferenceLineList::from_wavelengths(&[1.0]).unwrap();
        let err = match_lines(&[], &refs, &Dispersion::identity(), 0.0).unwrap_err();
        assert!(matches!(err, ProfileError::InvalidParameter { .. }));
    }
}
