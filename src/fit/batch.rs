//! Independent fits over many titrations.

use rayon::prelude::*;

use crate::domain::{FitOptions, FitResult, ModelKind, Titration};
use crate::error::FitError;
use crate::fit::fit_titration;

/// Fit every titration in parallel.
///
/// Results are returned in input order; a failing dataset does not affect the others.
pub fn fit_batch(model: ModelKind, titrations: &[Titration], options: &FitOptions) -> Vec<Result<FitResult, FitError>> {
    titrations
        .par_iter()
        .map(|t| fit_titration(model, t, options))
        .collect()
}
