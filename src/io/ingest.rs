//! Text-table ingest for spectra and reference line lists.
//!
//! Both formats are plain tables read with the `csv` crate:
//!
//! - comma- or whitespace-separated columns
//! - `#` starts a comment line
//! - an optional header row (detected when its first field is not numeric)
//!
//! Spectra are `position,flux` (or a single `flux` column indexed by pixel).
//! Line lists are `wavelength[,intensity[,label]]`.
//!
//! Parse errors are fatal and carry the 1-based line number; numeric checks on
//! the parsed values are left to `Spectrum::new` / `ReferenceLineList::new`.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{ReferenceLine, ReferenceLineList, Spectrum};
use crate::error::AppError;

const POSITION_COLUMNS: [&str; 5] = ["position", "pixel", "x", "wavelength", "lambda"];
const FLUX_COLUMNS: [&str; 4] = ["flux", "counts", "intensity", "y"];

/// Load a spectrum table from disk.
pub fn read_spectrum(path: &Path) -> Result<Spectrum, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open spectrum '{}': {e}", path.display())))?;
    parse_spectrum(file).map_err(|e| AppError::new(2, format!("{}: {e}", path.display())))
}

/// Load a reference line list from disk.
pub fn read_reference_lines(path: &Path) -> Result<ReferenceLineList, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open line list '{}': {e}", path.display())))?;
    parse_reference_lines(file).map_err(|e| AppError::new(2, format!("{}: {e}", path.display())))
}

/// Parse a spectrum table.
pub fn parse_spectrum<R: Read>(reader: R) -> Result<Spectrum, String> {
    let table = read_table(reader)?;

    let (pos_col, flux_col) = match &table.header {
        Some(header) => {
            let flux = find_column(header, &FLUX_COLUMNS).ok_or("missing flux column")?;
            (find_column(header, &POSITION_COLUMNS), flux)
        }
        None => match table.rows.first().map(|(_, r)| r.len()) {
            Some(1) => (None, 0),
            _ => (Some(0), 1),
        },
    };

    let mut positions = Vec::with_capacity(table.rows.len());
    let mut flux = Vec::with_capacity(table.rows.len());
    for (line, record) in &table.rows {
        if let Some(col) = pos_col {
            positions.push(parse_field(record, col, "position", *line)?);
        }
        flux.push(parse_field(record, flux_col, "flux", *line)?);
    }

    let spectrum = match pos_col {
        Some(_) => Spectrum::new(positions, flux),
        None => Spectrum::from_flux(flux),
    };
    spectrum.map_err(|e| e.to_string())
}

/// Parse a reference line list.
pub fn parse_reference_lines<R: Read>(reader: R) -> Result<ReferenceLineList, String> {
    let table = read_table(reader)?;

    let (wl_col, int_col, label_col) = match &table.header {
        Some(header) => (
            find_column(header, &["wavelength", "lambda", "wave"]).ok_or("missing wavelength column")?,
            find_column(header, &["intensity", "strength", "flux"]),
            find_column(header, &["label", "species", "id", "name"]),
        ),
        None => (0, Some(1), Some(2)),
    };

    let mut lines = Vec::with_capacity(table.rows.len());
    for (line, record) in &table.rows {
        let wavelength = parse_field(record, wl_col, "wavelength", *line)?;
        let intensity = match int_col.and_then(|c| record.get(c)).filter(|s| !s.is_empty()) {
            Some(s) => Some(
                s.parse::<f64>()
                    .map_err(|_| format!("line {line}: invalid intensity '{s}'"))?,
            ),
            None => None,
        };
        // Whitespace-separated labels may have been split ("Th I").
        let label = label_col
            .filter(|&c| c < record.len())
            .map(|c| record.iter().skip(c).collect::<Vec<_>>().join(" "))
            .filter(|s| !s.is_empty());
        lines.push(ReferenceLine {
            wavelength,
            intensity,
            label,
        });
    }

    ReferenceLineList::new(lines).map_err(|e| e.to_string())
}

struct Table {
    header: Option<HashMap<String, usize>>,
    /// `(line number, fields)`.
    rows: Vec<(usize, StringRecord)>,
}

fn read_table<R: Read>(reader: R) -> Result<Table, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut header = None;
    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| format!("CSV parse error: {e}"))?;
        let line = record.position().map_or(0, |p| p.line() as usize);
        let record = split_whitespace_fields(&record);
        if record.iter().all(str::is_empty) {
            continue;
        }

        let first_is_numeric = record.get(0).is_some_and(|s| s.parse::<f64>().is_ok());
        if !first_is_numeric && rows.is_empty() && header.is_none() {
            header = Some(build_header_map(&record));
            continue;
        }
        rows.push((line, record));
    }

    if rows.is_empty() {
        return Err("no data rows".to_string());
    }
    Ok(Table { header, rows })
}

/// Split a lone field such as `"100.0   5.2"` on whitespace; comma-separated
/// records keep their (possibly empty) fields.
fn split_whitespace_fields(record: &StringRecord) -> StringRecord {
    if record.len() != 1 {
        return record.clone();
    }
    record
        .get(0)
        .map(|field| field.split_whitespace().collect())
        .unwrap_or_default()
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn find_column(header: &HashMap<String, usize>, names: &[&str]) -> Option<usize> {
    names.iter().find_map(|n| header.get(*n).copied())
}

fn parse_field(record: &StringRecord, col: usize, what: &str, line: usize) -> Result<f64, String> {
    let raw = record
        .get(col)
        .ok_or_else(|| format!("line {line}: missing {what} column"))?;
    raw.parse::<f64>()
        .map_err(|_| format!("line {line}: invalid {what} '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_two_column_csv_with_header_and_comments() {
        let text = "# lamp exposure\npixel,flux\n0,1.5\n1,2.5\n# gap\n2,3.5\n";
        let s = parse_spectrum(text.as_bytes()).unwrap();
        assert_eq!(s.positions(), &[0.0, 1.0, 2.0]);
        assert_eq!(s.flux(), &[1.5, 2.5, 3.5]);
    }

    #[test]
    fn reads_whitespace_columns() {
        let text = "4000.0   10\n4000.5\t12\n4001.0 11\n";
        let s = parse_spectrum(text.as_bytes()).unwrap();
        assert_eq!(s.positions(), &[4000.0, 4000.5, 4001.0]);
        assert_eq!(s.flux(), &[10.0, 12.0, 11.0]);
    }

    #[test]
    fn single_column_is_flux_by_pixel() {
        let s = parse_spectrum("3\n4\n5\n6\n".as_bytes()).unwrap();
        assert_eq!(s.positions(), &[0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn header_columns_can_be_reordered() {
        let text = "flux,wavelength\n10,5000\n20,5001\n30,5002\n";
        let s = parse_spectrum(text.as_bytes()).unwrap();
        assert_eq!(s.positions(), &[5000.0, 5001.0, 5002.0]);
        assert_eq!(s.flux(), &[10.0, 20.0, 30.0]);
    }

    #[test]
    fn bad_value_reports_line_number() {
        let err = parse_spectrum("0,1\n1,abc\n2,3\n".as_bytes()).unwrap_err();
        assert!(err.contains("line 2"), "{err}");
    }

    #[test]
    fn reads_line_list_with_optional_fields() {
        let text = "# wavelength intensity label\n5000.0 120 Th I\n4000.0\n4500.0,80\n";
        let list = parse_reference_lines(text.as_bytes()).unwrap();
        let lines = list.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].wavelength, 4000.0);
        assert_eq!(lines[0].intensity, None);
        assert_eq!(lines[1].intensity, Some(80.0));
        assert_eq!(lines[2].label.as_deref(), Some("Th I"));
    }

    #[test]
    fn duplicate_reference_wavelength_is_rejected() {
        let err = parse_reference_lines("4000\n4000\n".as_bytes()).unwrap_err();
        assert!(err.contains("duplicate"), "{err}");
    }

    #[test]
    fn reads_files_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.txt");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "0 1\n1 5\n2 1").unwrap();
        drop(f);

        let s = read_spectrum(&path).unwrap();
        assert_eq!(s.len(), 3);

        let missing = read_spectrum(&dir.path().join("nope.txt")).unwrap_err();
        assert_eq!(missing.exit_code(), 2);
    }
}
