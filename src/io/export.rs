//! CSV exports: matched-line tables and synthetic spectra.
//!
//! Exports are meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{MatchedLine, ReferenceLineList, Spectrum};
use crate::error::AppError;
use crate::matching::Dispersion;

/// Write one row per matched line.
///
/// `width_wavelength` is the fitted width scaled by the local slope of `dispersion`.
pub fn write_matched_lines_csv(path: &Path, matched: &[MatchedLine], dispersion: &Dispersion) -> Result<(), AppError> {
    let mut file = create(path, "matched-lines CSV")?;

    writeln!(
        file,
        "pixel,wavelength,predicted_wavelength,distance,width,width_wavelength,fwhm,amplitude,baseline,relative_rms,label"
    )
    .map_err(|e| AppError::new(2, format!("Failed to write matched-lines CSV header: {e}")))?;

    for m in matched {
        writeln!(
            file,
            "{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6e},{}",
            m.fit.center,
            m.reference.wavelength,
            m.predicted_wavelength,
            m.distance,
            m.fit.width,
            dispersion.width_to_wavelength(m.fit.center, m.fit.width),
            m.fit.fwhm,
            m.fit.amplitude,
            m.fit.baseline,
            m.fit.quality.relative_rms,
            m.reference.label.as_deref().unwrap_or(""),
        )
        .map_err(|e| AppError::new(2, format!("Failed to write matched-lines CSV row: {e}")))?;
    }

    Ok(())
}

/// Write `position,flux` rows.
pub fn write_spectrum_csv(path: &Path, spectrum: &Spectrum) -> Result<(), AppError> {
    let mut file = create(path, "spectrum CSV")?;
    writeln!(file, "position,flux").map_err(|e| AppError::new(2, format!("Failed to write spectrum CSV: {e}")))?;
    for (x, y) in spectrum.positions().iter().zip(spectrum.flux()) {
        writeln!(file, "{x},{y:.6}").map_err(|e| AppError::new(2, format!("Failed to write spectrum CSV: {e}")))?;
    }
    Ok(())
}

/// Write `wavelength,intensity,label` rows.
pub fn write_reference_lines_csv(path: &Path, references: &ReferenceLineList) -> Result<(), AppError> {
    let mut file = create(path, "line list CSV")?;
    writeln!(file, "wavelength,intensity,label")
        .map_err(|e| AppError::new(2, format!("Failed to write line list CSV: {e}")))?;
    for line in references.lines() {
        writeln!(
            file,
            "{:.6},{},{}",
            line.wavelength,
            line.intensity.map(|v| format!("{v:.3}")).unwrap_or_default(),
            line.label.as_deref().unwrap_or(""),
        )
        .map_err(|e| AppError::new(2, format!("Failed to write line list CSV: {e}")))?;
    }
    Ok(())
}

fn create(path: &Path, what: &str) -> Result<File, AppError> {
    File::create(path).map_err(|e| AppError::new(2, format!("Failed to create {what} '{}': {e}", path.display())))
}
