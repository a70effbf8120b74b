//! Formatted terminal output.
//!
//! Formatting lives here so the numerical modules stay free of presentation
//! code and output changes stay localized.

use crate::domain::{Axis, MatchedLine, Position, ProfileConfig, ProfileMeasure};
use crate::matching::Dispersion;
use crate::profile::{InstrumentalProfile, Kernel};
use crate::report::QualityReport;

/// Format the full run summary: stage counts, dispersion and profile range.
pub fn format_run_summary(report: &QualityReport, profile: &InstrumentalProfile, config: &ProfileConfig) -> String {
    let mut out = String::new();

    out.push_str("=== instprofile - Instrumental Profile ===\n");
    out.push_str(&format!(
        "Shape: {} | measure: {} | interpolation: {:?} | extrapolation: {:?}\n",
        config.shape().display_name(),
        measure_label(config.measure),
        config.interpolation,
        config.extrapolation_policy,
    ));
    out.push_str(&format!(
        "Spectrum: n={} | threshold={:.4} | min separation={}\n",
        report.spectrum_samples, report.detection_threshold, config.min_separation
    ));

    out.push_str("\nStages:\n");
    out.push_str(&format!(
        "- regions found : {} ({} truncated at an edge)\n",
        report.regions_found, report.regions_truncated
    ));
    out.push_str(&format!("- fits accepted : {}\n", report.fits_accepted));
    for r in report.rejected.iter().filter(|r| r.count > 0) {
        out.push_str(&format!("  (rejected {}) {}\n", r.reason, r.count));
    }
    out.push_str(&format!(
        "- lines matched : {} (unmatched: {} fits, {} references)\n",
        report.matched, report.unmatched_fits, report.unmatched_references
    ));
    out.push_str(&format!(
        "- dispersion    : {} (lambda = sum a_k x^k, x in pixels)\n",
        fmt_vec(&report.dispersion.pixel_coefficients())
    ));

    let (p0, p1) = profile.range(Axis::Pixel);
    let (l0, l1) = profile.range(Axis::Wavelength);
    let widths: Vec<f64> = profile.samples().iter().map(|s| s.width).collect();
    let w_min = widths.iter().cloned().fold(f64::INFINITY, f64::min);
    let w_max = widths.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    out.push_str("\nProfile:\n");
    out.push_str(&format!("- samples   : {}\n", profile.samples().len()));
    out.push_str(&format!("- pixel     : [{p0:.3}, {p1:.3}]\n"));
    out.push_str(&format!("- wavelength: [{l0:.4}, {l1:.4}]\n"));
    out.push_str(&format!(
        "- {:<10}: [{w_min:.4}, {w_max:.4}]\n",
        measure_label(profile.measure())
    ));
    out.push('\n');

    out
}

/// Table of matched lines, one row per calibration sample.
///
/// `width_wl` is the fitted width converted to wavelength units through the
/// local slope of `dispersion`.
pub fn format_line_table(matched: &[MatchedLine], dispersion: &Dispersion) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>10} {:>12} {:>10} {:>9} {:>9} {:>9} {:>11} {:>10} {:<12}\n",
            "pixel", "wavelength", "distance", "width", "width_wl", "fwhm", "amplitude", "rel_rms", "label"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<10} {:-<12} {:-<10} {:-<9} {:-<9} {:-<9} {:-<11} {:-<10} {:-<12}\n",
            "", "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for m in matched {
        out.push_str(
            format!(
                "{:>10.3} {:>12.4} {:>10.4} {:>9.4} {:>9.4} {:>9.4} {:>11.3} {:>10.2e} {:<12}\n",
                m.fit.center,
                m.reference.wavelength,
                m.distance,
                m.fit.width,
                dispersion.width_to_wavelength(m.fit.center, m.fit.width),
                m.fit.fwhm,
                m.fit.amplitude,
                m.fit.quality.relative_rms,
                truncate(m.reference.label.as_deref().unwrap_or(""), 12),
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// One profile query, optionally with its rendered kernel.
pub fn format_query(position: Position, value: f64, measure: ProfileMeasure, kernel: Option<&Kernel>) -> String {
    let mut out = format!(
        "{:?} {:.4}: {} = {:.6}\n",
        position.axis(),
        position.value(),
        measure_label(measure),
        value
    );
    if let Some(kernel) = kernel {
        out.push_str(&format!(
            "kernel: {} | fwhm={:.6} | step={:.6} | n={}\n",
            kernel.shape.display_name(),
            kernel.fwhm,
            kernel.step,
            kernel.len()
        ));
        for (offset, density) in kernel.offsets.iter().zip(&kernel.densities) {
            out.push_str(&format!("{offset:>12.6} {density:>14.8e}\n"));
        }
    }
    out
}

fn measure_label(measure: ProfileMeasure) -> &'static str {
    match measure {
        ProfileMeasure::Width => "width",
        ProfileMeasure::Fwhm => "fwhm",
    }
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6}")).collect();
    format!("[{}]", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
