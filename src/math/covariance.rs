//! Parameter covariance from the Jacobian at the optimum.
//!
//! We use the usual nonlinear-regression approximation
//!
//! ```text
//! cov = pinv(JᵀJ) · SSR / (m - n)
//! ```
//!
//! where `J` is the (weighted) residual Jacobian. `pinv(JᵀJ)` is formed from the
//! SVD of `J` directly (`V Σ⁻² Vᵀ`), dropping singular values below
//! `eps · max(m, n) · s_max`, which avoids squaring the condition number.

use nalgebra::DMatrix;

/// Reasons the covariance cannot be formed.
#[derive(Debug, Clone, PartialEq)]
pub enum CovarianceError {
    /// Not enough observations to estimate the residual variance.
    Underdetermined { observations: usize, params: usize },
    /// The Jacobian is zero or contains non-finite entries.
    Degenerate,
}

impl std::fmt::Display for CovarianceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CovarianceError::Underdetermined { observations, params } => write!(
                f,
                "{observations} observations do not exceed {params} parameters"
            ),
            CovarianceError::Degenerate => write!(f, "Jacobian is degenerate at the optimum"),
        }
    }
}

/// The residual variance needs `observations > params`.
pub fn ensure_residual_dof(observations: usize, params: usize) -> Result<(), CovarianceError> {
    if observations <= params {
        return Err(CovarianceError::Underdetermined { observations, params });
    }
    Ok(())
}

/// Covariance of the fitted parameters.
///
/// `ssr` is the sum of squared (weighted) residuals at the optimum.
pub fn covariance_from_jacobian(jac: &DMatrix<f64>, ssr: f64) -> Result<DMatrix<f64>, CovarianceError> {
    let (m, n) = jac.shape();
    ensure_residual_dof(m, n)?;
    if !jac.iter().all(|v| v.is_finite()) {
        return Err(CovarianceError::Degenerate);
    }

    let svd = jac.clone().svd(false, true);
    let v_t = svd.v_t.ok_or(CovarianceError::Degenerate)?;
    let s_max = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
    if !(s_max.is_finite() && s_max > 0.0) {
        return Err(CovarianceError::Degenerate);
    }
    let threshold = f64::EPSILON * m.max(n) as f64 * s_max;

    let mut cov = DMatrix::<f64>::zeros(n, n);
    for (k, &s) in svd.singular_values.iter().enumerate() {
        if s <= threshold {
            continue;
        }
        let v = v_t.row(k).transpose();
        cov += (&v * v.transpose()) / (s * s);
    }

    let variance = ssr / (m - n) as f64;
    Ok(cov * variance)
}
