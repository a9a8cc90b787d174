//! Shared domain types.
//!
//! These types are kept small and serializable so fit results can be:
//!
//! - consumed in-memory by library callers
//! - exported to JSON by the `bindfit` binary
//! - reloaded later for comparison

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{FitError, InputError, Series};
use crate::math::Termination;

/// Lower bound used in place of exact zero for physical concentrations
/// (`kd`, `constant`), keeping the solver off the singular point.
pub const CONCENTRATION_FLOOR: f64 = f64::MIN_POSITIVE * 1e4;

/// Binding model to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Single-site binding with one partner in large excess.
    Hyperbola,
    /// Exact two-species equilibrium (tight binding).
    Quadratic,
}

impl ModelKind {
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Hyperbola => "hyperbola",
            ModelKind::Quadratic => "quadratic",
        }
    }

    /// Number of fitted parameters.
    pub fn param_count(self) -> usize {
        match self {
            ModelKind::Hyperbola => 3,
            ModelKind::Quadratic => 4,
        }
    }

    /// Parameter names in result order.
    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            ModelKind::Hyperbola => &["intercept", "amplitude", "kd"],
            ModelKind::Quadratic => &["intercept", "amplitude", "kd", "constant"],
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A single titration: signal measured at each titrant concentration.
///
/// `dispersions`, when present, holds one spread estimate per point (usually the
/// sample standard deviation of replicate reads) and is used to weight the fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Titration {
    pub concentrations: Vec<f64>,
    pub signals: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispersions: Option<Vec<f64>>,
}

impl Titration {
    pub fn new(concentrations: Vec<f64>, signals: Vec<f64>) -> Self {
        Self {
            concentrations,
            signals,
            dispersions: None,
        }
    }

    pub fn with_dispersions(mut self, dispersions: Vec<f64>) -> Self {
        self.dispersions = Some(dispersions);
        self
    }

    /// Collapse replicate reads into one signal per concentration.
    ///
    /// The signal is the replicate mean and the dispersion is the sample standard
    /// deviation (`n - 1` denominator); a single read has zero dispersion.
    pub fn from_replicates(concentrations: Vec<f64>, replicates: &[Vec<f64>]) -> Result<Self, InputError> {
        if replicates.len() != concentrations.len() {
            return Err(InputError::LengthMismatch {
                series: Series::Signals,
                expected: concentrations.len(),
                found: replicates.len(),
            });
        }

        let mut signals = Vec::with_capacity(replicates.len());
        let mut dispersions = Vec::with_capacity(replicates.len());
        for (index, reads) in replicates.iter().enumerate() {
            if reads.is_empty() {
                return Err(InputError::EmptyReplicates { index });
            }
            let n = reads.len() as f64;
            let mean = reads.iter().sum::<f64>() / n;
            let sd = if reads.len() > 1 {
                let ss: f64 = reads.iter().map(|r| (r - mean) * (r - mean)).sum();
                (ss / (n - 1.0)).sqrt()
            } else {
                0.0
            };
            signals.push(mean);
            dispersions.push(sd);
        }

        Ok(Self {
            concentrations,
            signals,
            dispersions: Some(dispersions),
        })
    }

    pub fn len(&self) -> usize {
        self.concentrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concentrations.is_empty()
    }
}

/// Admissible sign of a fitted parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sign {
    /// `[0, +inf)`
    NonNegative,
    /// `(-inf, 0]`
    NonPositive,
}

impl Sign {
    /// Map a regression coefficient to a sign constraint.
    ///
    /// Exact zero falls on the non-positive side.
    pub fn of(value: f64) -> Self {
        if value > 0.0 {
            Sign::NonNegative
        } else {
            Sign::NonPositive
        }
    }

    /// `(lower, upper)` for this sign.
    pub fn interval(self) -> (f64, f64) {
        match self {
            Sign::NonNegative => (0.0, f64::INFINITY),
            Sign::NonPositive => (f64::NEG_INFINITY, 0.0),
        }
    }

    /// `magnitude` with this sign.
    pub fn apply(self, magnitude: f64) -> f64 {
        match self {
            Sign::NonNegative => magnitude.abs(),
            Sign::NonPositive => -magnitude.abs(),
        }
    }
}

/// Sign constraints for the intercept and amplitude parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignBounds {
    pub intercept: Sign,
    pub amplitude: Sign,
}

impl SignBounds {
    /// Full box bounds `(lower, upper)` for every parameter of `model`.
    ///
    /// `kd` and `constant` are `[CONCENTRATION_FLOOR, +inf)`.
    pub fn to_box(&self, model: ModelKind) -> (Vec<f64>, Vec<f64>) {
        let n = model.param_count();
        let mut lower = Vec::with_capacity(n);
        let mut upper = Vec::with_capacity(n);
        for sign in [self.intercept, self.amplitude] {
            let (lo, hi) = sign.interval();
            lower.push(lo);
            upper.push(hi);
        }
        for _ in 2..n {
            lower.push(CONCENTRATION_FLOOR);
            upper.push(f64::INFINITY);
        }
        (lower, upper)
    }

    /// Starting point for the optimizer, scaled to the data.
    ///
    /// Intercept and amplitude start at the signal range on their allowed side.
    /// `kd` and `constant` start at the geometric mean of the nonzero
    /// concentration magnitudes, so nM and M titrations begin equally close.
    pub fn initial_guess(&self, model: ModelKind, concentrations: &[f64], signals: &[f64]) -> Vec<f64> {
        let (lo, hi) = signals
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let range = hi - lo;
        let signal_scale = if range.is_finite() && range > 0.0 { range } else { 1.0 };

        let (log_sum, count) = concentrations
            .iter()
            .filter(|c| **c != 0.0)
            .fold((0.0, 0usize), |(sum, n), c| (sum + c.abs().ln(), n + 1));
        let concentration_scale = match count {
            0 => 1.0,
            n => (log_sum / n as f64).exp().max(CONCENTRATION_FLOOR),
        };

        let mut x0 = vec![self.intercept.apply(signal_scale), self.amplitude.apply(signal_scale)];
        x0.resize(model.param_count(), concentration_scale);
        x0
    }
}

/// A fitted parameter value and its standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub value: f64,
    pub stddev: f64,
}

/// Fit diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    /// Weighted sum of squared residuals at the optimum.
    pub ssr: f64,
    /// Number of observations.
    pub n: usize,
    /// Residual degrees of freedom (`n - k`).
    pub dof: usize,
    /// Residual evaluations spent by the solver.
    pub evaluations: usize,
    pub termination: Termination,
    /// Whether per-point dispersions were used as weights.
    pub weighted: bool,
}

/// Fit output for a single model, parameters in `ModelKind::param_names` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub model: ModelKind,
    pub params: Vec<Estimate>,
    pub bounds: SignBounds,
    pub quality: FitQuality,
}

impl FitResult {
    /// Point estimates in parameter order.
    pub fn values(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.value).collect()
    }

    /// Flat `(value, stddev)` sequence in the documented result order.
    pub fn flat(&self) -> Vec<f64> {
        self.params.iter().flat_map(|p| [p.value, p.stddev]).collect()
    }

    /// Look up an estimate by parameter name.
    pub fn estimate(&self, name: &str) -> Option<Estimate> {
        self.model
            .param_names()
            .iter()
            .position(|n| *n == name)
            .and_then(|i| self.params.get(i).copied())
    }
}

/// Typed hyperbolic fit result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HyperbolaFit {
    pub intercept: Estimate,
    pub amplitude: Estimate,
    pub kd: Estimate,
}

impl HyperbolaFit {
    /// `None` unless `result` is a hyperbola fit.
    pub fn from_result(result: &FitResult) -> Option<Self> {
        match (result.model, result.params.as_slice()) {
            (ModelKind::Hyperbola, [intercept, amplitude, kd]) => Some(Self {
                intercept: *intercept,
                amplitude: *amplitude,
                kd: *kd,
            }),
            _ => None,
        }
    }

    /// `(intercept, intercept_stddev, amplitude, amplitude_stddev, kd, kd_stddev)`
    pub fn to_tuple(&self) -> (f64, f64, f64, f64, f64, f64) {
        (
            self.intercept.value,
            self.intercept.stddev,
            self.amplitude.value,
            self.amplitude.stddev,
            self.kd.value,
            self.kd.stddev,
        )
    }
}

/// Typed quadratic fit result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuadraticFit {
    pub intercept: Estimate,
    pub amplitude: Estimate,
    pub kd: Estimate,
    pub constant: Estimate,
}

impl QuadraticFit {
    /// `None` unless `result` is a quadratic fit.
    pub fn from_result(result: &FitResult) -> Option<Self> {
        match (result.model, result.params.as_slice()) {
            (ModelKind::Quadratic, [intercept, amplitude, kd, constant]) => Some(Self {
                intercept: *intercept,
                amplitude: *amplitude,
                kd: *kd,
                constant: *constant,
            }),
            _ => None,
        }
    }

    /// `(intercept, intercept_stddev, amplitude, amplitude_stddev, kd, kd_stddev,
    /// constant, constant_stddev)`
    #[allow(clippy::type_complexity)]
    pub fn to_tuple(&self) -> (f64, f64, f64, f64, f64, f64, f64, f64) {
        (
            self.intercept.value,
            self.intercept.stddev,
            self.amplitude.value,
            self.amplitude.stddev,
            self.kd.value,
            self.kd.stddev,
            self.constant.value,
            self.constant.stddev,
        )
    }
}

/// A fitted curve sampled on a concentration grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveGrid {
    pub concentrations: Vec<f64>,
    pub signals: Vec<f64>,
}

/// Portable representation of one fit, as written by `bindfit fit --export`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    /// Input file the titration was read from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub result: FitResult,
    pub curve: CurveGrid,
}

/// Solver configuration for a fit.
///
/// Defaults mirror common nonlinear curve-fit settings: `1e-8` tolerances on cost
/// change, step size and gradient orthogonality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    /// The solver gives up after `patience · (k + 1)` residual evaluations,
    /// `k` being the parameter count.
    pub patience: usize,
    /// Relative cost-reduction tolerance.
    pub ftol: f64,
    /// Relative step-size tolerance.
    pub xtol: f64,
    /// Gradient orthogonality tolerance.
    pub gtol: f64,
    /// Initial trust-region radius, relative to the scaled parameter norm.
    pub stepbound: f64,
    /// Use titration dispersions as weights when present.
    pub weighted: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            patience: 200,
            ftol: 1e-8,
            xtol: 1e-8,
            gtol: 1e-8,
            stepbound: 100.0,
            weighted: true,
        }
    }
}

impl FitOptions {
    pub fn validate(&self) -> Result<(), FitError> {
        if self.patience == 0 {
            return Err(FitError::InvalidOptions("patience must be > 0".into()));
        }
        for (name, tol) in [("ftol", self.ftol), ("xtol", self.xtol), ("gtol", self.gtol)] {
            if !(tol.is_finite() && tol >= 0.0) {
                return Err(FitError::InvalidOptions(format!(
                    "{name} must be finite and non-negative, got {tol}"
                )));
            }
        }
        if !(self.stepbound.is_finite() && self.stepbound > 0.0) {
            return Err(FitError::InvalidOptions(format!(
                "stepbound must be finite and positive, got {}",
                self.stepbound
            )));
        }
        Ok(())
    }
}
