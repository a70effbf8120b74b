//! The measurement pipeline shared by the CLI and library callers.
//!
//! spectrum -> candidate regions -> line fits -> dispersion -> matches -> profile
//!
//! Each stage is pure; this module only wires them together, picks the
//! detection threshold and dispersion solution from the config, and collects
//! the quality report.

use log::{info, warn};

use crate::detect::{PeakSearch, auto_threshold, locate_with};
use crate::domain::{CandidateRegion, DispersionMode, ProfileConfig, ReferenceLineList, Spectrum};
use crate::error::ProfileError;
use crate::fit::{LineFitBatch, LineFitOptions, fit_regions};
use crate::matching::{Dispersion, MatchOutcome, match_lines};
use crate::profile::{InstrumentalProfile, ProfileOptions};
use crate::report::QualityReport;

/// All computed outputs of a single `measure` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub regions: Vec<CandidateRegion>,
    pub batch: LineFitBatch,
    pub dispersion: Dispersion,
    pub matches: MatchOutcome,
    pub profile: InstrumentalProfile,
    pub report: QualityReport,
}

/// Execute the full pipeline.
///
/// # Errors
/// - `InvalidParameter` for an invalid config
/// - `InsufficientData` when no line survives to the profile builder
/// - `DispersionUnavailable` when the automatic dispersion cannot be derived
pub fn run_profile(
    spectrum: &Spectrum,
    references: &ReferenceLineList,
    config: &ProfileConfig,
) -> Result<RunOutput, ProfileError> {
    config.validate()?;

    // 1) Candidate regions.
    let threshold = config
        .detection_threshold
        .unwrap_or_else(|| auto_threshold(spectrum));
    let search = PeakSearch::new(config.min_separation, threshold).with_region_fraction(config.region_fraction);
    let regions = locate_with(spectrum, &search)?;
    info!("{} candidate regions above threshold {threshold:.4}", regions.len());

    // 2) Per-line fits.
    let batch = fit_regions(spectrum, &regions, &LineFitOptions::from_config(config));
    info!(
        "{} lines fitted, {} regions rejected",
        batch.fits.len(),
        batch.rejected.len()
    );
    if batch.fits.is_empty() {
        return Err(ProfileError::InsufficientData { usable: 0 });
    }

    // 3) Dispersion used to predict reference positions.
    let dispersion = match config.dispersion {
        DispersionMode::Identity => Dispersion::identity(),
        DispersionMode::Linear => Dispersion::linear(config.dispersion_offset, config.dispersion_slope),
        DispersionMode::Auto => {
            Dispersion::coarse_linear(&batch.fits, references, config.anchor_lines, config.match_tolerance)?
        }
    };

    // 4) Identification.
    let matches = match_lines(&batch.fits, references, &dispersion, config.match_tolerance)?;
    info!("{} lines matched to the reference list", matches.matched.len());
    if matches.unmatched_fits > 0 {
        warn!("{} fitted lines have no reference within tolerance", matches.unmatched_fits);
    }

    // 5) Profile model.
    let profile = InstrumentalProfile::build(&matches.matched, &ProfileOptions::from_config(config))?;

    let report = QualityReport::new(spectrum.len(), threshold, &regions, &batch, &matches, &dispersion);

    Ok(RunOutput {
        regions,
        batch,
        dispersion,
        matches,
        profile,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SyntheticLamp;
    use crate::domain::{Position, ShapeModel};
    use crate::models::predict;

    fn three_gaussians() -> (Spectrum, ReferenceLineList) {
        let lines = [(100.0, 2.0, 120.0), (500.0, 2.5, 80.0), (900.0, 3.0, 100.0)];
        let flux: Vec<f64> = (0..1000)
            .map(|i| {
                lines
                    .iter()
                    .map(|&(c, w, a)| predict(ShapeModel::Gaussian, i as f64, &[a, c, w, 0.0]))
                    .sum::<f64>()
            })
            .collect();
        let spectrum = Spectrum::from_flux(flux).unwrap();
        let references = ReferenceLineList::from_wavelengths(&[4000.0, 4500.0, 5000.0]).unwrap();
        (spectrum, references)
    }

    #[test]
    fn three_line_scenario() {
        let (spectrum, references) = three_gaussians();
        let out = run_profile(&spectrum, &references, &ProfileConfig::default()).unwrap();

        assert_eq!(out.matches.matched.len(), 3);
        for (m, (wl, w)) in out.matches.matched.iter().zip([(4000.0, 2.0), (4500.0, 2.5), (5000.0, 3.0)]) {
            assert_eq!(m.reference.wavelength, wl);
            assert!((m.fit.width - w).abs() / w < 0.01, "width {} vs {w}", m.fit.width);
        }

        let mid = out.profile.width_at(Position::Wavelength(4250.0)).unwrap();
        assert!(mid > 2.0 && mid < 2.5, "width at 4250 = {mid}");
        assert!((out.profile.width_at(Position::Pixel(500.0)).unwrap() - 2.5).abs() < 1e-3);

        assert_eq!(out.report.regions_found, 3);
        assert_eq!(out.report.fits_accepted, 3);
        assert_eq!(out.report.rejected_total(), 0);
        assert!((out.dispersion.wavelength_at(300.0) - 4250.0).abs() < 1e-2);
    }

    #[test]
    fn unranked_list_with_extra_lines_still_matches() {
        let (spectrum, _) = three_gaussians();
        let references = ReferenceLineList::from_wavelengths(&[3800.0, 4000.0, 4500.0, 5000.0, 5300.0]).unwrap();
        let out = run_profile(&spectrum, &references, &ProfileConfig::default()).unwrap();

        let wavelengths: Vec<f64> = out.matches.matched.iter().map(|m| m.reference.wavelength).collect();
        assert_eq!(wavelengths, vec![4000.0, 4500.0, 5000.0]);
        assert_eq!(out.matches.unmatched_references, 2);
        assert!((out.dispersion.wavelength_at(300.0) - 4250.0).abs() < 1e-2);
    }

    #[test]
    fn single_line_needs_explicit_dispersion() {
        let flux: Vec<f64> = (0..600)
            .map(|i| predict(ShapeModel::Gaussian, i as f64, &[100.0, 300.0, 2.0, 0.0]))
            .collect();
        let spectrum = Spectrum::from_flux(flux).unwrap();
        let references = ReferenceLineList::from_wavelengths(&[4250.0]).unwrap();

        let err = run_profile(&spectrum, &references, &ProfileConfig::default()).unwrap_err();
        assert!(matches!(err, ProfileError::DispersionUnavailable(_)));

        let config = ProfileConfig {
            dispersion: DispersionMode::Linear,
            dispersion_offset: 3875.0,
            dispersion_slope: 1.25,
            ..ProfileConfig::default()
        };
        let out = run_profile(&spectrum, &references, &config).unwrap();
        assert_eq!(out.matches.matched.len(), 1);
        let w = out.profile.width_at(Position::Pixel(0.0)).unwrap();
        assert!((w - 2.0).abs() < 0.02);
        assert_eq!(out.profile.width_at(Position::Pixel(599.0)).unwrap(), w);
    }

    #[test]
    fn flat_spectrum_is_insufficient_data() {
        let spectrum = Spectrum::from_flux(vec![3.0; 200]).unwrap();
        let references = ReferenceLineList::from_wavelengths(&[4000.0]).unwrap();
        let err = run_profile(&spectrum, &references, &ProfileConfig::default()).unwrap_err();
        assert_eq!(err, ProfileError::InsufficientData { usable: 0 });
    }

    #[test]
    fn no_matches_is_insufficient_data() {
        let (spectrum, _) = three_gaussians();
        let references = ReferenceLineList::from_wavelengths(&[9000.0]).unwrap();
        let config = ProfileConfig {
            dispersion: DispersionMode::Identity,
            ..ProfileConfig::default()
        };
        let err = run_profile(&spectrum, &references, &config).unwrap_err();
        assert_eq!(err, ProfileError::InsufficientData { usable: 0 });
    }

    #[test]
    fn invalid_config_is_rejected_before_detection() {
        let (spectrum, references) = three_gaussians();
        let config = ProfileConfig {
            min_separation: -1.0,
            ..ProfileConfig::default()
        };
        let err = run_profile(&spectrum, &references, &config).unwrap_err();
        assert!(matches!(err, ProfileError::InvalidParameter { name: "min_separation", .. }));
    }

    #[test]
    fn noisy_widening_lamp_recovers_widths() {
        let lamp = SyntheticLamp::widening(5, 2.0);
        let synthetic = lamp.render(6).unwrap();
        let config = ProfileConfig {
            min_separation: 10.0,
            dispersion: DispersionMode::Linear,
            dispersion_offset: lamp.dispersion_offset,
            dispersion_slope: lamp.dispersion_slope,
            ..ProfileConfig::default()
        };

        let out = run_profile(&synthetic.spectrum, &synthetic.references, &config).unwrap();
        assert_eq!(out.matches.matched.len(), lamp.lines.len());
        for m in &out.matches.matched {
            let truth = lamp
                .lines
                .iter()
                .find(|l| (lamp.wavelength_at(l.center) - m.reference.wavelength).abs() < 1e-9)
                .unwrap();
            assert!((m.fit.width - truth.width).abs() / truth.width < 0.05);
            assert!((m.fit.center - truth.center).abs() < 0.2);
        }

        let grid = out
            .profile
            .sample_grid(crate::domain::Axis::Pixel, 200.0, 1800.0, 50)
            .unwrap();
        assert!(grid.first().unwrap().width < grid.last().unwrap().width);
    }
}
