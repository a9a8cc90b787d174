//! Bounded nonlinear fit of a binding model to one titration.
//!
//! Given:
//! - concentrations `c_i`
//! - signals `y_i`
//! - optional dispersions `σ_i`
//!
//! we:
//! - validate the dataset
//! - derive sign bounds for intercept and amplitude from a linear pre-pass
//! - minimize `Σ ((model(c_i) - y_i) / σ_i)²` inside the box with the
//!   `levenberg-marquardt` crate, through the sign-bounded adapter in `math::lm`
//! - turn the Jacobian at the optimum into parameter standard deviations
//!
//! Every number that leaves this module has been checked for finiteness.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::domain::{
    Estimate, FitOptions, FitQuality, FitResult, HyperbolaFit, ModelKind, QuadraticFit, SignBounds, Titration,
};
use crate::error::FitError;
use crate::fit::{estimate_bounds, validate, validate_dispersions};
use crate::math::{BoundedSolver, ResidualModel, Solution, covariance_from_jacobian, ensure_residual_dof};
use crate::models::{fill_gradient_row, predict};

/// Residuals `w_i (model(c_i) - y_i)` with `w_i = 1 / σ_i`.
struct TitrationProblem<'a> {
    model: ModelKind,
    concentrations: &'a [f64],
    signals: &'a [f64],
    weights: Vec<f64>,
}

impl<'a> TitrationProblem<'a> {
    fn new(model: ModelKind, concentrations: &'a [f64], signals: &'a [f64], sigmas: Option<&[f64]>) -> Self {
        let weights = match sigmas {
            Some(sigmas) => sigmas.iter().map(|s| 1.0 / s).collect(),
            None => vec![1.0; concentrations.len()],
        };
        Self {
            model,
            concentrations,
            signals,
            weights,
        }
    }
}

impl ResidualModel for TitrationProblem<'_> {
    fn param_count(&self) -> usize {
        self.model.param_count()
    }

    fn residuals(&self, p: &[f64]) -> DVector<f64> {
        DVector::from_iterator(
            self.concentrations.len(),
            self.concentrations
                .iter()
                .zip(self.signals)
                .zip(&self.weights)
                .map(|((&c, &y), &w)| w * (predict(self.model, c, p) - y)),
        )
    }

    fn jacobian(&self, p: &[f64]) -> DMatrix<f64> {
        let k = self.model.param_count();
        let mut jac = DMatrix::<f64>::zeros(self.concentrations.len(), k);
        let mut row = vec![0.0; k];
        for (i, (&c, &w)) in self.concentrations.iter().zip(&self.weights).enumerate() {
            fill_gradient_row(self.model, c, p, &mut row);
            for j in 0..k {
                jac[(i, j)] = w * row[j];
            }
        }
        jac
    }
}

/// Fit the hyperbolic model with default options and no weighting.
///
/// Three points pass validation but leave no residual degrees of freedom, so a
/// 3-point fit always fails with [`FitError::Covariance`]; at least four points
/// are needed for a result.
pub fn fit_hyperbola(concentrations: &[f64], signals: &[f64]) -> Result<HyperbolaFit, FitError> {
    let result = fit_unweighted(ModelKind::Hyperbola, concentrations, signals)?;
    let p = &result.params;
    Ok(HyperbolaFit {
        intercept: p[0],
        amplitude: p[1],
        kd: p[2],
    })
}

/// Fit the quadratic model with default options and no weighting.
///
/// As with [`fit_hyperbola`], the fit needs more points than parameters: 3- and
/// 4-point datasets fail with [`FitError::Covariance`].
pub fn fit_quadratic(concentrations: &[f64], signals: &[f64]) -> Result<QuadraticFit, FitError> {
    let result = fit_unweighted(ModelKind::Quadratic, concentrations, signals)?;
    let p = &result.params;
    Ok(QuadraticFit {
        intercept: p[0],
        amplitude: p[1],
        kd: p[2],
        constant: p[3],
    })
}

fn fit_unweighted(model: ModelKind, concentrations: &[f64], signals: &[f64]) -> Result<FitResult, FitError> {
    validate(concentrations, signals)?;
    fit_validated(model, concentrations, signals, None, &FitOptions::default())
}

/// Fit `model` to a titration.
///
/// Dispersions are used as weights when `options.weighted` is set and the
/// titration carries them; an all-zero dispersion vector means uniform weights.
pub fn fit_titration(model: ModelKind, titration: &Titration, options: &FitOptions) -> Result<FitResult, FitError> {
    options.validate()?;
    validate(&titration.concentrations, &titration.signals)?;

    let sigmas = match (&titration.dispersions, options.weighted) {
        (Some(d), true) => validate_dispersions(d, titration.len())?.then_some(d.as_slice()),
        _ => None,
    };

    fit_validated(model, &titration.concentrations, &titration.signals, sigmas, options)
}

fn fit_validated(
    model: ModelKind,
    concentrations: &[f64],
    signals: &[f64],
    sigmas: Option<&[f64]>,
    options: &FitOptions,
) -> Result<FitResult, FitError> {
    ensure_residual_dof(concentrations.len(), model.param_count())
        .map_err(|e| FitError::Covariance(e.to_string()))?;

    let bounds = estimate_bounds(concentrations, signals)?;
    let (lower, upper) = bounds.to_box(model);
    let x0 = bounds.initial_guess(model, concentrations, signals);

    let problem = TitrationProblem::new(model, concentrations, signals, sigmas);
    let solver = BoundedSolver {
        ftol: options.ftol,
        xtol: options.xtol,
        gtol: options.gtol,
        stepbound: options.stepbound,
        patience: options.patience,
    };
    let solution = solver.minimize(&problem, &x0, &lower, &upper)?;
    debug!(
        model = %model,
        evaluations = solution.evaluations,
        termination = ?solution.termination,
        ssr = solution.ssr,
        "solver finished"
    );

    reduce(model, bounds, solution, sigmas.is_some())
}

/// Turn a converged solution into a `FitResult` with standard deviations.
fn reduce(model: ModelKind, bounds: SignBounds, solution: Solution, weighted: bool) -> Result<FitResult, FitError> {
    if !solution.params.iter().all(|v| v.is_finite()) {
        return Err(FitError::NonFinite { what: "parameters" });
    }
    if !solution.ssr.is_finite() {
        return Err(FitError::NonFinite {
            what: "sum of squared residuals",
        });
    }

    let cov = covariance_from_jacobian(&solution.jacobian, solution.ssr)
        .map_err(|e| FitError::Covariance(e.to_string()))?;
    if !cov.iter().all(|v| v.is_finite()) {
        return Err(FitError::NonFinite { what: "covariance" });
    }

    let params: Vec<Estimate> = solution
        .params
        .iter()
        .enumerate()
        .map(|(i, &value)| Estimate {
            value,
            stddev: cov[(i, i)].max(0.0).sqrt(),
        })
        .collect();

    let (n, k) = solution.jacobian.shape();
    Ok(FitResult {
        model,
        params,
        bounds,
        quality: FitQuality {
            ssr: solution.ssr,
            n,
            dof: n - k,
            evaluations: solution.evaluations,
            termination: solution.termination,
            weighted,
        },
    })
}
