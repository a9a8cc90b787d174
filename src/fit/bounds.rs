//! Sign bounds from a linear regression pre-pass.
//!
//! Binding data can rise or fall with concentration. The nonlinear fit cannot
//! tell from the data alone which sign the amplitude should carry, and started
//! unconstrained it can settle on the wrong-signed branch. A straight-line fit of
//! the raw data settles the question cheaply:
//!
//! - regression intercept `> 0` → intercept in `[0, +inf)`, else `(-inf, 0]`
//! - regression slope `> 0` → amplitude in `[0, +inf)`, else `(-inf, 0]`

use tracing::debug;

use crate::domain::{Sign, SignBounds};
use crate::error::FitError;
use crate::math::linear_regression;

/// Derive intercept and amplitude sign bounds for a validated titration.
pub fn estimate_bounds(concentrations: &[f64], signals: &[f64]) -> Result<SignBounds, FitError> {
    let line = linear_regression(concentrations, signals).ok_or_else(|| {
        FitError::Regression(format!(
            "no finite line through {} points (degenerate or extreme values)",
            concentrations.len()
        ))
    })?;

    let bounds = SignBounds {
        intercept: Sign::of(line.intercept),
        amplitude: Sign::of(line.slope),
    };
    debug!(
        slope = line.slope,
        intercept = line.intercept,
        ?bounds,
        "sign bounds from linear pre-pass"
    );
    Ok(bounds)
}
