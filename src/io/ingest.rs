//! CSV ingest of titration data.
//!
//! Expected layout (header row required, column names case-insensitive):
//!
//! ```text
//! concentration,read1,read2,read3
//! 0,0.01,0.02,-0.01
//! 10,0.15,0.13,
//! ```
//!
//! - `concentration` (or `conc`) is required; every other column holds
//!   replicate signal reads. Empty cells are missing reads.
//! - Alternatively a single signal column plus an `sd` (or `dispersion`) column
//!   supplies pre-aggregated data, as written by `bindfit simulate`.
//!
//! Parsing is strict: a malformed cell aborts the load with its line number.
//! Numeric validation (duplicates, magnitudes, NaN) is left to the fit.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::Titration;
use crate::error::AppError;

const CONCENTRATION_COLUMNS: [&str; 2] = ["concentration", "conc"];
const DISPERSION_COLUMNS: [&str; 2] = ["sd", "dispersion"];

/// Resolved column roles for one file.
#[derive(Debug, Clone)]
struct Layout {
    concentration: usize,
    dispersion: Option<usize>,
    signals: Vec<usize>,
}

/// Load a titration from a CSV file.
pub fn load_titration_csv(path: &Path) -> Result<Titration, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::usage(format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_titration_csv(file).map_err(|e| e.context(path.display()))
}

/// Parse a titration from any CSV source.
pub fn read_titration_csv<R: Read>(source: R) -> Result<Titration, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| AppError::usage(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let layout = resolve_layout(&build_header_map(&headers), headers.len())?;

    let mut concentrations = Vec::new();
    let mut replicates = Vec::new();
    let mut dispersions = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        // +2: records start after the header and lines are 1-based.
        let line = idx + 2;
        let record = result.map_err(|e| AppError::usage(format!("line {line}: CSV parse error: {e}")))?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let c = get_required(&record, layout.concentration, "concentration")
            .and_then(parse_f64)
            .map_err(|e| AppError::usage(format!("line {line}: {e}")))?;

        let mut reads = Vec::with_capacity(layout.signals.len());
        for &col in &layout.signals {
            if let Some(cell) = get_optional(&record, col) {
                reads.push(parse_f64(cell).map_err(|e| AppError::usage(format!("line {line}: {e}")))?);
            }
        }
        if reads.is_empty() {
            return Err(AppError::usage(format!("line {line}: no signal values")));
        }

        if let Some(col) = layout.dispersion {
            let sd = get_required(&record, col, "sd")
                .and_then(parse_f64)
                .map_err(|e| AppError::usage(format!("line {line}: {e}")))?;
            dispersions.push(sd);
        }

        concentrations.push(c);
        replicates.push(reads);
    }

    if concentrations.is_empty() {
        return Err(AppError::usage("CSV has no data rows"));
    }

    if layout.dispersion.is_some() {
        let signals = replicates.into_iter().map(|r| r[0]).collect();
        Ok(Titration::new(concentrations, signals).with_dispersions(dispersions))
    } else {
        Ok(Titration::from_replicates(concentrations, &replicates)?)
    }
}

fn resolve_layout(header_map: &HashMap<String, usize>, width: usize) -> Result<Layout, AppError> {
    let concentration = find_column(header_map, &CONCENTRATION_COLUMNS).ok_or_else(|| {
        AppError::usage(format!(
            "Missing required column: one of {}",
            CONCENTRATION_COLUMNS.join(", ")
        ))
    })?;
    let dispersion = find_column(header_map, &DISPERSION_COLUMNS);
    let signals: Vec<usize> = (0..width)
        .filter(|&i| i != concentration && Some(i) != dispersion)
        .collect();

    if signals.is_empty() {
        return Err(AppError::usage("CSV has no signal columns"));
    }
    if dispersion.is_some() && signals.len() != 1 {
        return Err(AppError::usage(format!(
            "An `sd` column requires exactly one signal column, found {}",
            signals.len()
        )));
    }

    Ok(Layout {
        concentration,
        dispersion,
        signals,
    })
}

fn find_column(header_map: &HashMap<String, usize>, names: &[&str]) -> Option<usize> {
    names.iter().find_map(|n| header_map.get(*n).copied())
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn get_required<'a>(record: &'a StringRecord, idx: usize, name: &str) -> Result<&'a str, String> {
    get_optional(record, idx).ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a number. `NaN`/`inf` are accepted here and rejected by validation.
fn parse_f64(s: &str) -> Result<f64, String> {
    s.parse::<f64>().map_err(|_| format!("Invalid number '{s}'"))
}
