//! Dataset validation.
//!
//! Every check runs before any regression or optimization, so a rejected dataset
//! never costs more than a scan and a sort. The first violated rule is reported.

use crate::error::{InputError, Series};

/// Minimum number of measurements in a titration.
pub const MIN_POINTS: usize = 3;

/// Smallest nonzero concentration magnitude accepted.
pub const MIN_CONCENTRATION_MAGNITUDE: f64 = 1e-50;

/// Largest concentration magnitude accepted.
pub const MAX_CONCENTRATION_MAGNITUDE: f64 = 1e50;

/// Smallest `max(signals) - min(signals)` that still carries information.
pub const MIN_SIGNAL_RANGE: f64 = 1e-50;

/// Check a `(concentrations, signals)` pair.
///
/// Exact-zero concentrations are accepted (the usual titration baseline); any
/// other magnitude must lie within `[1e-50, 1e50]`.
pub fn validate(concentrations: &[f64], signals: &[f64]) -> Result<(), InputError> {
    for len in [concentrations.len(), signals.len()] {
        if len < MIN_POINTS {
            return Err(InputError::TooFewPoints {
                min: MIN_POINTS,
                found: len,
            });
        }
    }
    if signals.len() != concentrations.len() {
        return Err(InputError::LengthMismatch {
            series: Series::Signals,
            expected: concentrations.len(),
            found: signals.len(),
        });
    }

    ensure_finite(Series::Concentrations, concentrations)?;
    ensure_finite(Series::Signals, signals)?;

    for (index, &value) in concentrations.iter().enumerate() {
        let magnitude = value.abs();
        if magnitude > MAX_CONCENTRATION_MAGNITUDE
            || (magnitude != 0.0 && magnitude < MIN_CONCENTRATION_MAGNITUDE)
        {
            return Err(InputError::ConcentrationOutOfRange { index, value });
        }
    }

    let mut sorted = concentrations.to_vec();
    sorted.sort_by(f64::total_cmp);
    if let Some(pair) = sorted.windows(2).find(|w| w[0] == w[1]) {
        return Err(InputError::DuplicateConcentration { value: pair[0] });
    }

    let (lo, hi) = signals
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = hi - lo;
    if range < MIN_SIGNAL_RANGE {
        return Err(InputError::FlatSignal { range });
    }

    Ok(())
}

/// Check per-point dispersions for weighting and report whether they are usable.
///
/// Returns `Ok(false)` when every dispersion is zero (one read per point): the
/// fit then falls back to uniform weights.
pub fn validate_dispersions(dispersions: &[f64], n: usize) -> Result<bool, InputError> {
    if dispersions.len() != n {
        return Err(InputError::LengthMismatch {
            series: Series::Dispersions,
            expected: n,
            found: dispersions.len(),
        });
    }
    ensure_finite(Series::Dispersions, dispersions)?;

    if let Some((index, &value)) = dispersions.iter().enumerate().find(|(_, d)| **d < 0.0) {
        return Err(InputError::InvalidDispersion {
            index,
            value,
            reason: "dispersion must be non-negative",
        });
    }
    if dispersions.iter().all(|&d| d == 0.0) {
        return Ok(false);
    }
    if let Some((index, &value)) = dispersions.iter().enumerate().find(|(_, d)| **d == 0.0) {
        return Err(InputError::InvalidDispersion {
            index,
            value,
            reason: "zero dispersion alongside nonzero ones cannot be weighted",
        });
    }
    Ok(true)
}

fn ensure_finite(series: Series, values: &[f64]) -> Result<(), InputError> {
    match values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        Some((index, &value)) => Err(InputError::NonFinite { series, index, value }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const C: [f64; 4] = [0.0, 1.0, 2.0, 3.0];
    const S: [f64; 4] = [0.0, 0.4, 0.6, 0.7];

    #[test]
    fn accepts_well_formed_titration() {
        assert_eq!(validate(&C, &S), Ok(()));
    }

    #[test]
    fn rejects_too_few_points() {
        assert_eq!(
            validate(&[1.0, 2.0], &[1.0, 2.0]),
            Err(InputError::TooFewPoints { min: 3, found: 2 })
        );
        assert_eq!(
            validate(&C, &[1.0]),
            Err(InputError::TooFewPoints { min: 3, found: 1 })
        );
    }

    #[test]
    fn rejects_length_mismatch() {
        assert!(matches!(
            validate(&C, &S[..3]),
            Err(InputError::LengthMismatch { expected: 4, found: 3, .. })
        ));
    }

    #[test]
    fn rejects_duplicates_including_signed_zero() {
        assert_eq!(
            validate(&[1.0, 2.0, 1.0], &[0.0, 1.0, 2.0]),
            Err(InputError::DuplicateConcentration { value: 1.0 })
        );
        assert!(matches!(
            validate(&[0.0, -0.0, 1.0], &[0.0, 1.0, 2.0]),
            Err(InputError::DuplicateConcentration { .. })
        ));
    }

    #[test]
    fn rejects_nan_and_infinity() {
        assert!(matches!(
            validate(&[0.0, f64::NAN, 2.0], &[0.0, 1.0, 2.0]),
            Err(InputError::NonFinite { series: Series::Concentrations, index: 1, .. })
        ));
        assert!(matches!(
            validate(&C, &[0.0, 1.0, f64::NAN, 2.0]),
            Err(InputError::NonFinite { series: Series::Signals, index: 2, .. })
        ));
        assert!(matches!(
            validate(&C, &[0.0, 1.0, f64::INFINITY, 2.0]),
            Err(InputError::NonFinite { series: Series::Signals, .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_magnitudes() {
        assert_eq!(
            validate(&[0.0, 1e-60, 1.0], &[0.0, 1.0, 2.0]),
            Err(InputError::ConcentrationOutOfRange { index: 1, value: 1e-60 })
        );
        assert_eq!(
            validate(&[0.0, 1.0, -2e50], &[0.0, 1.0, 2.0]),
            Err(InputError::ConcentrationOutOfRange { index: 2, value: -2e50 })
        );
        assert_eq!(validate(&[0.0, 1e-50, 1e50], &[0.0, 1.0, 2.0]), Ok(()));
    }

    #[test]
    fn rejects_flat_signal() {
        assert!(matches!(
            validate(&C, &[2.0, 2.0, 2.0, 2.0]),
            Err(InputError::FlatSignal { .. })
        ));
    }

    #[test]
    fn all_zero_dispersions_disable_weighting() {
        assert_eq!(validate_dispersions(&[0.0; 4], 4), Ok(false));
        assert_eq!(validate_dispersions(&[0.1, 0.2, 0.1, 0.3], 4), Ok(true));
    }

    #[test]
    fn rejects_unusable_dispersions() {
        assert!(matches!(
            validate_dispersions(&[0.1, 0.2], 4),
            Err(InputError::LengthMismatch { series: Series::Dispersions, .. })
        ));
        assert!(matches!(
            validate_dispersions(&[0.1, -0.2, 0.1, 0.1], 4),
            Err(InputError::InvalidDispersion { index: 1, .. })
        ));
        assert!(matches!(
            validate_dispersions(&[0.1, 0.0, 0.1, 0.1], 4),
            Err(InputError::InvalidDispersion { index: 1, .. })
        ));
        assert!(matches!(
            validate_dispersions(&[0.1, f64::NAN, 0.1, 0.1], 4),
            Err(InputError::NonFinite { series: Series::Dispersions, .. })
        ));
    }
}
