//! Sign-bounded nonlinear least squares on the `levenberg-marquardt` crate.
//!
//! The crate's MINPACK-style solver is unconstrained, so half-open boxes are
//! handled by reparametrization. Each parameter `θ` is driven by an internal
//! coordinate `u`:
//!
//! - `[lo, +inf)`: `θ = lo + u²`
//! - `(-inf, hi]`: `θ = hi - u²`
//! - unbounded: `θ = u`
//!
//! Residuals and the Jacobian are evaluated in `θ`, and Jacobian columns are
//! chained through `dθ/du`. A parameter sitting on its bound has `u = 0`; if the
//! optimum lies on a bound with the gradient pointing out of the box, `u = 0` is
//! a regular minimum in the internal coordinates.
//!
//! The Jacobian reported with a [`Solution`] is the one in `θ`, which is what
//! the covariance needs.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use nalgebra::storage::Owned;
use nalgebra::{DMatrix, DVector, Dyn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Residuals and Jacobian of a fit, in the model's own parameters.
pub trait ResidualModel {
    /// Number of parameters `n`.
    fn param_count(&self) -> usize;

    /// Residual vector `r(θ)`.
    fn residuals(&self, params: &[f64]) -> DVector<f64>;

    /// Jacobian `∂r/∂θ`, shape `m × n`.
    fn jacobian(&self, params: &[f64]) -> DMatrix<f64>;
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Residuals are exactly zero.
    ZeroResidual,
    /// The residual vector is orthogonal (within `gtol`) to every Jacobian column.
    Gradient,
    /// The relative cost reduction fell below `ftol`.
    CostReduction,
    /// The step fell below `xtol` relative to the parameter norm.
    StepSize,
}

/// Solver failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("expected {expected} values for {what}, got {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("bound {index} is not a half-open or unbounded interval: [{lower}, {upper}]")]
    InvalidBounds { index: usize, lower: f64, upper: f64 },

    #[error("non-finite {what}")]
    NonFinite { what: &'static str },

    #[error("no convergence after {evaluations} evaluations: {reason}")]
    NoConvergence { evaluations: usize, reason: &'static str },

    #[error("solver rejected the problem: {0}")]
    Rejected(String),
}

/// One parameter's feasible set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Free,
    AtLeast(f64),
    AtMost(f64),
}

impl Bound {
    /// Classify `[lower, upper]`. Boxes closed on both sides are not supported.
    pub fn from_interval(lower: f64, upper: f64) -> Option<Self> {
        let open_below = lower == f64::NEG_INFINITY;
        let open_above = upper == f64::INFINITY;
        match (open_below, open_above) {
            (true, true) => Some(Bound::Free),
            (false, true) if lower.is_finite() => Some(Bound::AtLeast(lower)),
            (true, false) if upper.is_finite() => Some(Bound::AtMost(upper)),
            _ => None,
        }
    }

    fn to_external(self, u: f64) -> f64 {
        match self {
            Bound::Free => u,
            Bound::AtLeast(lo) => lo + u * u,
            Bound::AtMost(hi) => hi - u * u,
        }
    }

    /// Internal coordinate for `theta`; points on or outside the bound map to `0`.
    fn to_internal(self, theta: f64) -> f64 {
        match self {
            Bound::Free => theta,
            Bound::AtLeast(lo) => (theta - lo).max(0.0).sqrt(),
            Bound::AtMost(hi) => (hi - theta).max(0.0).sqrt(),
        }
    }

    /// `dθ/du`.
    fn slope(self, u: f64) -> f64 {
        match self {
            Bound::Free => 1.0,
            Bound::AtLeast(_) => 2.0 * u,
            Bound::AtMost(_) => -2.0 * u,
        }
    }
}

/// The crate-facing view of a [`ResidualModel`] in internal coordinates.
struct Reparametrized<'a, P> {
    problem: &'a P,
    bounds: &'a [Bound],
    u: DVector<f64>,
    theta: Vec<f64>,
}

impl<P> Clone for Reparametrized<'_, P> {
    fn clone(&self) -> Self {
        Self {
            problem: self.problem,
            bounds: self.bounds,
            u: self.u.clone(),
            theta: self.theta.clone(),
        }
    }
}

impl<'a, P> Reparametrized<'a, P> {
    fn new(problem: &'a P, bounds: &'a [Bound], u: DVector<f64>) -> Self {
        let theta = external(bounds, &u);
        Self {
            problem,
            bounds,
            u,
            theta,
        }
    }
}

fn external(bounds: &[Bound], u: &DVector<f64>) -> Vec<f64> {
    bounds.iter().zip(u.iter()).map(|(b, &u)| b.to_external(u)).collect()
}

impl<P: ResidualModel> LeastSquaresProblem<f64, Dyn, Dyn> for Reparametrized<'_, P> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, u: &DVector<f64>) {
        self.u.copy_from(u);
        self.theta = external(self.bounds, &self.u);
    }

    fn params(&self) -> DVector<f64> {
        self.u.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let r = self.problem.residuals(&self.theta);
        r.iter().all(|v| v.is_finite()).then_some(r)
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let mut jac = self.problem.jacobian(&self.theta);
        for (j, mut column) in jac.column_iter_mut().enumerate() {
            column *= self.bounds[j].slope(self.u[j]);
        }
        jac.iter().all(|v| v.is_finite()).then_some(jac)
    }
}

/// Converged solver state, in the model's parameters.
#[derive(Debug, Clone)]
pub struct Solution {
    pub params: DVector<f64>,
    pub residuals: DVector<f64>,
    /// Jacobian `∂r/∂θ` evaluated at `params`.
    pub jacobian: DMatrix<f64>,
    /// Sum of squared residuals at `params`.
    pub ssr: f64,
    /// Residual evaluations spent by the solver.
    pub evaluations: usize,
    pub termination: Termination,
}

/// Settings for [`BoundedSolver::minimize`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundedSolver {
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
    /// Initial step bound, relative to the scaled parameter norm.
    pub stepbound: f64,
    /// The solver gives up after `patience · (n + 1)` evaluations.
    pub patience: usize,
}

impl Default for BoundedSolver {
    fn default() -> Self {
        Self {
            ftol: 1e-8,
            xtol: 1e-8,
            gtol: 1e-8,
            stepbound: 100.0,
            patience: 100,
        }
    }
}

impl BoundedSolver {
    /// Minimize `||r(θ)||²` from `x0` subject to `lower ≤ θ ≤ upper`.
    ///
    /// A starting value on (or outside) its bound is moved one unit inside.
    pub fn minimize<P: ResidualModel>(
        &self,
        problem: &P,
        x0: &[f64],
        lower: &[f64],
        upper: &[f64],
    ) -> Result<Solution, SolverError> {
        let n = problem.param_count();
        for (what, found) in [("x0", x0.len()), ("lower", lower.len()), ("upper", upper.len())] {
            if found != n {
                return Err(SolverError::DimensionMismatch {
                    what,
                    expected: n,
                    found,
                });
            }
        }
        if !x0.iter().all(|v| v.is_finite()) {
            return Err(SolverError::NonFinite { what: "starting point" });
        }

        let bounds = lower
            .iter()
            .zip(upper)
            .enumerate()
            .map(|(index, (&lo, &hi))| {
                Bound::from_interval(lo, hi).ok_or(SolverError::InvalidBounds {
                    index,
                    lower: lo,
                    upper: hi,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let u0 = DVector::from_iterator(
            n,
            bounds.iter().zip(x0).map(|(b, &x)| match b.to_internal(x) {
                u if u == 0.0 && *b != Bound::Free => 1.0,
                u => u,
            }),
        );

        let start = Reparametrized::new(problem, &bounds, u0);
        if start.residuals().is_none() {
            return Err(SolverError::NonFinite {
                what: "residuals at the starting point",
            });
        }

        let (fitted, report) = LevenbergMarquardt::<f64>::new()
            .with_ftol(self.ftol)
            .with_xtol(self.xtol)
            .with_gtol(self.gtol)
            .with_stepbound(self.stepbound)
            .with_patience(self.patience)
            .minimize(start);

        let evaluations = report.number_of_evaluations;
        let termination = match report.termination {
            TerminationReason::ResidualsZero => Termination::ZeroResidual,
            TerminationReason::Orthogonal => Termination::Gradient,
            TerminationReason::Converged { ftol: true, .. } => Termination::CostReduction,
            TerminationReason::Converged { .. } => Termination::StepSize,
            TerminationReason::LostPatience => {
                return Err(SolverError::NoConvergence {
                    evaluations,
                    reason: "evaluation budget exhausted",
                });
            }
            TerminationReason::User(what) | TerminationReason::Numerical(what) => {
                return Err(SolverError::NonFinite { what });
            }
            other => return Err(SolverError::Rejected(format!("{other:?}"))),
        };

        let params = DVector::from_vec(fitted.theta);
        let residuals = problem.residuals(params.as_slice());
        let jacobian = problem.jacobian(params.as_slice());
        let ssr = residuals.norm_squared();
        Ok(Solution {
            params,
            residuals,
            jacobian,
            ssr,
            evaluations,
            termination,
        })
    }
}
