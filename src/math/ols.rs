//! Ordinary linear regression for the bound pre-pass.
//!
//! The simple regression uses centered sums rather than a design matrix: it is a
//! two-parameter problem and centering avoids cancellation for offset `x`.

/// Ordinary least-squares line `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

/// Regress `y` on `x`.
///
/// Returns `None` for fewer than two points, mismatched lengths, zero spread in
/// `x`, or any non-finite intermediate.
pub fn linear_regression(x: &[f64], y: &[f64]) -> Option<LinearFit> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let n = x.len() as f64;
    let x_bar = x.iter().sum::<f64>() / n;
    let y_bar = y.iter().sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - x_bar;
        sxx += dx * dx;
        sxy += dx * (yi - y_bar);
    }
    if !(sxx.is_finite() && sxy.is_finite()) || sxx <= 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = y_bar - slope * x_bar;
    if slope.is_finite() && intercept.is_finite() {
        Some(LinearFit { slope, intercept })
    } else {
        None
    }
}
