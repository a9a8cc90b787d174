//! Shared "fit pipeline" logic behind `bindfit fit`.
//!
//! load CSV files -> fit (single or batch) -> one `FitRun` per file
//!
//! Presentation (tables, JSON, exports) lives in `app`.

use std::path::PathBuf;

use tracing::info;

use crate::domain::{FitOptions, FitResult, ModelKind, Titration};
use crate::error::{AppError, FitError};
use crate::fit::{fit_batch, fit_titration};
use crate::io::load_titration_csv;

/// What to fit and how.
#[derive(Debug, Clone)]
pub struct FitJob {
    pub model: ModelKind,
    pub files: Vec<PathBuf>,
    pub options: FitOptions,
}

/// Outcome for one input file.
#[derive(Debug, Clone)]
pub struct FitRun {
    pub source: PathBuf,
    pub titration: Titration,
    pub outcome: Result<FitResult, FitError>,
}

/// Load every file, then fit.
///
/// A file that cannot be read aborts the run; a titration that cannot be
/// fitted is reported in its `FitRun` and does not affect the others.
pub fn run_fit(job: &FitJob) -> Result<Vec<FitRun>, AppError> {
    let titrations = job
        .files
        .iter()
        .map(|path| -> Result<Titration, AppError> {
            let t = load_titration_csv(path)?;
            info!(path = %path.display(), points = t.len(), "loaded titration");
            Ok(t)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let outcomes = match titrations.as_slice() {
        [single] => vec![fit_titration(job.model, single, &job.options)],
        many => fit_batch(job.model, many, &job.options),
    };

    Ok(job
        .files
        .iter()
        .cloned()
        .zip(titrations)
        .zip(outcomes)
        .map(|((source, titration), outcome)| FitRun {
            source,
            titration,
            outcome,
        })
        .collect())
}
