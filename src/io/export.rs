//! Result and dataset exports.
//!
//! - fit results go to JSON (`FitFile` schema), with the fitted curve sampled on
//!   an even grid for quick plotting elsewhere
//! - titrations go to CSV in the layout `ingest` reads back

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{CurveGrid, FitFile, FitResult, Titration};
use crate::error::AppError;
use crate::models::predict;

/// Points in the exported fitted-curve grid.
const GRID_POINTS: usize = 101;

/// Wrap a fit result with its fitted curve over the data's concentration range.
pub fn fit_file(result: &FitResult, titration: &Titration, source: Option<&Path>) -> FitFile {
    let (lo, hi) = titration
        .concentrations
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &c| (lo.min(c), hi.max(c)));
    FitFile {
        tool: "bindfit".to_string(),
        source: source.map(|p| p.display().to_string()),
        result: result.clone(),
        curve: build_grid(result, lo, hi, GRID_POINTS),
    }
}

/// Write fit results as a JSON array.
pub fn write_fit_json(path: &Path, fits: &[FitFile]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::usage(format!("Failed to create JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, fits)
        .map_err(|e| AppError::usage(format!("Failed to write JSON: {e}")))?;
    Ok(())
}

/// Write a titration as CSV to a file.
pub fn write_titration_csv(path: &Path, titration: &Titration) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::usage(format!("Failed to create CSV '{}': {e}", path.display())))?;
    write_titration(file, titration).map_err(|e| e.context(path.display()))
}

/// Write a titration as `concentration,signal[,sd]` rows.
pub fn write_titration<W: Write>(sink: W, titration: &Titration) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(sink);
    let row_err = |e: csv::Error| AppError::usage(format!("Failed to write CSV row: {e}"));

    match &titration.dispersions {
        Some(_) => writer.write_record(["concentration", "signal", "sd"]),
        None => writer.write_record(["concentration", "signal"]),
    }
    .map_err(row_err)?;

    for (i, (c, y)) in titration.concentrations.iter().zip(&titration.signals).enumerate() {
        let mut row = vec![c.to_string(), y.to_string()];
        if let Some(sd) = titration.dispersions.as_ref().and_then(|d| d.get(i)) {
            row.push(sd.to_string());
        }
        writer.write_record(&row).map_err(row_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::usage(format!("Failed to flush CSV: {e}")))?;
    Ok(())
}

fn build_grid(result: &FitResult, lo: f64, hi: f64, n: usize) -> CurveGrid {
    let n = n.max(2);
    let (c0, c1) = if lo.is_finite() && hi.is_finite() && hi > lo {
        (lo, hi)
    } else {
        (0.0, 1.0)
    };
    let params = result.values();

    let mut concentrations = Vec::with_capacity(n);
    let mut signals = Vec::with_capacity(n);
    for i in 0..n {
        let u = i as f64 / (n as f64 - 1.0);
        let c = c0 + u * (c1 - c0);
        concentrations.push(c);
        signals.push(predict(result.model, c, &params));
    }
    CurveGrid {
        concentrations,
        signals,
    }
}
