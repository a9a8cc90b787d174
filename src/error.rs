//! Error types.
//!
//! The library surfaces two kinds of failure:
//!
//! - [`InputError`]: the dataset breaks a precondition and no numerics were attempted
//! - [`FitError`]: a numeric failure during regression, optimization or covariance
//!   estimation (or an [`InputError`] wrapped on its way out of a fit call)
//!
//! [`AppError`] is the binary-facing error carrying a process exit code.

use thiserror::Error;

use crate::math::SolverError;

/// Which input sequence a validation failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Series {
    Concentrations,
    Signals,
    Dispersions,
}

impl std::fmt::Display for Series {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Series::Concentrations => "concentrations",
            Series::Signals => "signals",
            Series::Dispersions => "dispersions",
        };
        f.write_str(name)
    }
}

/// A titration dataset that cannot be fitted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("at least {min} measurements are required, got {found}")]
    TooFewPoints { min: usize, found: usize },

    #[error("{series} has {found} values but concentrations has {expected}")]
    LengthMismatch {
        series: Series,
        expected: usize,
        found: usize,
    },

    #[error("concentration {value} appears more than once")]
    DuplicateConcentration { value: f64 },

    #[error("{series}[{index}] is not a finite number ({value})")]
    NonFinite {
        series: Series,
        index: usize,
        value: f64,
    },

    #[error("concentrations[{index}] = {value:e} is outside the supported magnitude range [1e-50, 1e50]")]
    ConcentrationOutOfRange { index: usize, value: f64 },

    #[error("signal range {range:e} is too small to fit (all signals are effectively equal)")]
    FlatSignal { range: f64 },

    #[error("no replicate reads at row {index}")]
    EmptyReplicates { index: usize },

    #[error("dispersions[{index}] = {value} is invalid: {reason}")]
    InvalidDispersion {
        index: usize,
        value: f64,
        reason: &'static str,
    },
}

/// A fit call that did not produce a result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),

    #[error("linear regression pre-pass failed: {0}")]
    Regression(String),

    #[error("solver did not converge after {evaluations} evaluations: {reason}")]
    NoConvergence { evaluations: usize, reason: String },

    #[error("non-finite {what} encountered during fit")]
    NonFinite { what: &'static str },

    #[error("parameter covariance could not be estimated: {0}")]
    Covariance(String),

    #[error("invalid fit options: {0}")]
    InvalidOptions(String),
}

impl FitError {
    /// True when the dataset was rejected before any numeric work.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, FitError::InvalidInput(_))
    }
}

impl From<SolverError> for FitError {
    fn from(err: SolverError) -> Self {
        match err {
            SolverError::NonFinite { what } => FitError::NonFinite { what },
            SolverError::NoConvergence { evaluations, reason } => FitError::NoConvergence {
                evaluations,
                reason: reason.to_string(),
            },
            other => FitError::InvalidOptions(other.to_string()),
        }
    }
}

/// Binary-level error: a message plus the exit code `bindfit` terminates with.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    /// Exit code for usage and I/O problems.
    pub const USAGE: u8 = 2;
    /// Exit code for datasets rejected by validation.
    pub const INVALID_INPUT: u8 = 3;
    /// Exit code for numeric fit failures.
    pub const FIT_FAILED: u8 = 4;

    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(Self::USAGE, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    /// Prefix the message with context (e.g. the file being processed).
    pub fn context(self, context: impl std::fmt::Display) -> Self {
        Self {
            exit_code: self.exit_code,
            message: format!("{context}: {}", self.message),
        }
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let code = if err.is_invalid_input() {
            Self::INVALID_INPUT
        } else {
            Self::FIT_FAILED
        };
        Self::new(code, err.to_string())
    }
}

impl From<InputError> for AppError {
    fn from(err: InputError) -> Self {
        FitError::from(err).into()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
