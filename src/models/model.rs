//! Model evaluation for the hyperbolic and quadratic binding models.
//!
//! The fitter relies on two primitive operations:
//! - predict `y(c)` given a parameter slice (for residuals)
//! - fill a gradient row `∂y/∂θ` at a concentration (for the Jacobian)
//!
//! The quadratic fraction bound is evaluated as `2c / (b + s)`, the rationalized
//! form of `(b - s) / (2·constant)`. Both are equal in exact arithmetic; the
//! rationalized one has no cancellation at large `c` and stays finite as
//! `constant → 0`, where it reduces to the hyperbolic fraction.

use crate::domain::ModelKind;

/// Hyperbolic binding curve: `intercept + amplitude * c / (c + kd)`.
///
/// Undefined (division by zero) wherever `c + kd == 0`.
pub fn hyperbola(concentrations: &[f64], intercept: f64, amplitude: f64, kd: f64) -> Vec<f64> {
    concentrations
        .iter()
        .map(|&c| hyperbola_at(c, intercept, amplitude, kd))
        .collect()
}

/// Quadratic (tight-binding) curve.
///
/// With `b = constant + c + kd`, the signal is
/// `intercept + amplitude * (b - sqrt(b² - 4·constant·c)) / (2·constant)`.
///
/// It is evaluated as `2c / (b + s)` with `s = sqrt(b² - 4·constant·c)`, which
/// equals the form above but stays finite at `constant = 0`, where it reduces to
/// the hyperbola.
pub fn quadratic(concentrations: &[f64], intercept: f64, amplitude: f64, kd: f64, constant: f64) -> Vec<f64> {
    concentrations
        .iter()
        .map(|&c| quadratic_at(c, intercept, amplitude, kd, constant))
        .collect()
}

pub fn hyperbola_at(c: f64, intercept: f64, amplitude: f64, kd: f64) -> f64 {
    intercept + amplitude * c / (c + kd)
}

pub fn quadratic_at(c: f64, intercept: f64, amplitude: f64, kd: f64, constant: f64) -> f64 {
    let (fraction, _, _) = quadratic_fraction(c, kd, constant);
    intercept + amplitude * fraction
}

/// Fraction bound `q`, plus `b` and `s = sqrt(b² - 4·constant·c)`.
///
/// `s²` is expanded as `(constant - c)² + kd·(kd + 2·constant + 2c)` and taken
/// through `hypot` and per-factor square roots, so it neither underflows for
/// molar-scale inputs nor cancels when `c ≈ constant`.
fn quadratic_fraction(c: f64, kd: f64, constant: f64) -> (f64, f64, f64) {
    let b = constant + c + kd;
    let m = kd + 2.0 * constant + 2.0 * c;
    let s = if kd >= 0.0 && m >= 0.0 {
        (constant - c).hypot(kd.sqrt() * m.sqrt())
    } else {
        // Negative concentrations: no underflow concern, keep the plain form.
        ((constant - c).powi(2) + kd * m).sqrt()
    };
    (2.0 * c / (b + s), b, s)
}

/// Predict the signal at `c` for `params` laid out as `model.param_names()`.
///
/// # Panics
/// Panics if `params` is shorter than `model.param_count()`.
pub fn predict(model: ModelKind, c: f64, params: &[f64]) -> f64 {
    match model {
        ModelKind::Hyperbola => hyperbola_at(c, params[0], params[1], params[2]),
        ModelKind::Quadratic => quadratic_at(c, params[0], params[1], params[2], params[3]),
    }
}

/// Fill `out` with the partial derivatives of the model at `c` with respect to
/// each parameter.
///
/// # Panics
/// Panics if `params` or `out` is shorter than `model.param_count()`.
pub fn fill_gradient_row(model: ModelKind, c: f64, params: &[f64], out: &mut [f64]) {
    match model {
        ModelKind::Hyperbola => {
            let amplitude = params[1];
            let denom = c + params[2];
            let fraction = c / denom;
            out[0] = 1.0;
            out[1] = fraction;
            out[2] = -amplitude * fraction / denom;
        }
        ModelKind::Quadratic => {
            let amplitude = params[1];
            let (q, b, s) = quadratic_fraction(c, params[2], params[3]);
            out[0] = 1.0;
            out[1] = q;
            if c == 0.0 {
                // q is identically zero along the baseline.
                out[2] = 0.0;
                out[3] = 0.0;
                return;
            }
            let q_over_s = q / s;
            // dq/dkd = -q/s
            out[2] = -amplitude * q_over_s;
            // dq/dconstant = -(q/s) (s + b - 2c) / (b + s), the ratio lies in [0, 1]
            out[3] = -amplitude * q_over_s * ((s + b - 2.0 * c) / (b + s));
        }
    }
}

impl ModelKind {
    /// Method form of [`predict`].
    pub fn predict(self, c: f64, params: &[f64]) -> f64 {
        predict(self, c, params)
    }

    /// Method form of [`fill_gradient_row`].
    pub fn fill_gradient_row(self, c: f64, params: &[f64], out: &mut [f64]) {
        fill_gradient_row(self, c, params, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hyperbola_half_saturation_at_kd() {
        let y = hyperbola(&[0.0, 10.0, 90.0], 0.0, 1.0, 10.0);
        assert_eq!(y, vec![0.0, 0.5, 0.9]);
    }

    #[test]
    fn hyperbola_zero_kd_saturates_immediately() {
        for amplitude in [-30.0, -2.0, -1.0, 0.0, 10.0, 50.0, 1000.0, 10_000_000.0] {
            let y = hyperbola(&[1.0, 10.0, 90.0], 0.0, amplitude, 0.0);
            assert!(y.iter().all(|&v| v == amplitude), "amplitude={amplitude}, got {y:?}");
        }
    }

    #[test]
    fn hyperbola_stays_below_saturation() {
        for i in 0..1000 {
            let c = i as f64 * 1e10;
            let y = hyperbola_at(c, 0.0, 1.0, 100.0);
            assert!(y < 1.0);
        }
    }

    #[test]
    fn quadratic_reference_values() {
        let y = quadratic(&[0.0, 10.0, 90_000_000.0], 3.0, 2.0, 10.0, 1.0);
        assert_eq!(y[0], 3.0);
        assert!(((y[1] - 3.0) / 2.0 - 0.487507803).abs() < 1e-9);
        assert!(y[2] - 3.0 < 2.0);
    }

    #[test]
    fn quadratic_matches_textbook_form_in_well_conditioned_range() {
        let (kd, constant): (f64, f64) = (4.0, 7.5);
        for &c in &[0.5, 1.0, 3.0, 12.0, 40.0] {
            let b = constant + c + kd;
            let textbook = (b - (b * b - 4.0 * constant * c).sqrt()) / (2.0 * constant);
            let ours = quadratic_at(c, 0.0, 1.0, kd, constant);
            assert!((ours - textbook).abs() < 1e-12, "c={c}: {ours} vs {textbook}");
        }
    }

    #[test]
    fn quadratic_gradient_is_finite_at_the_baseline_and_floor() {
        let mut row = [0.0; 4];
        fill_gradient_row(ModelKind::Quadratic, 0.0, &[1.0, 1.0, 1e-200, 1e-200], &mut row);
        assert_eq!(row, [1.0, 0.0, 0.0, 0.0]);

        let floor = crate::domain::CONCENTRATION_FLOOR;
        for &c in &[1e-9, 1e-7, 2e-7] {
            fill_gradient_row(ModelKind::Quadratic, c, &[100.0, 1000.0, floor, 1e-7], &mut row);
            assert!(row.iter().all(|v| v.is_finite()), "c={c}: {row:?}");
        }
    }

    #[test]
    fn gradients_match_central_differences_at_molar_scale() {
        let params = [100.0, 1000.0, 5e-8, 1e-7];
        let mut row = [0.0; 4];
        for &c in &[1e-9, 2e-8, 1e-7, 2e-7] {
            fill_gradient_row(ModelKind::Quadratic, c, &params, &mut row);
            for j in 2..4 {
                let h = 1e-6 * params[j];
                let mut up = params;
                let mut down = params;
                up[j] += h;
                down[j] -= h;
                let numeric = (predict(ModelKind::Quadratic, c, &up) - predict(ModelKind::Quadratic, c, &down)) / (2.0 * h);
                assert!(
                    (row[j] - numeric).abs() < 1e-5 * numeric.abs(),
                    "c={c} j={j}: analytic {} vs numeric {numeric}",
                    row[j]
                );
            }
        }
    }

    #[test]
    fn gradients_match_central_differences() {
        let cases: [(ModelKind, &[f64]); 2] = [
            (ModelKind::Hyperbola, &[0.3, 2.0, 15.0]),
            (ModelKind::Quadratic, &[0.3, 2.0, 15.0, 8.0]),
        ];
        for (model, params) in cases {
            let k = model.param_count();
            let mut row = vec![0.0; k];
            for &c in &[0.0, 1.0, 10.0, 50.0, 400.0] {
                fill_gradient_row(model, c, params, &mut row);
                for j in 0..k {
                    let h = 1e-6 * params[j].abs().max(1.0);
                    let mut up = params.to_vec();
                    let mut down = params.to_vec();
                    up[j] += h;
                    down[j] -= h;
                    let numeric = (predict(model, c, &up) - predict(model, c, &down)) / (2.0 * h);
                    assert!(
                        (row[j] - numeric).abs() < 1e-6 * numeric.abs().max(1.0),
                        "{model} c={c} j={j}: analytic {} vs numeric {numeric}",
                        row[j]
                    );
                }
            }
        }
    }
}
