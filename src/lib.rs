//! `binding-fits` library crate.
//!
//! Fits hyperbolic and quadratic (tight-binding) models to titration data and
//! reports each parameter with its standard deviation.
//!
//! The binary (`bindfit`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the fit pipeline can be embedded in other analysis tools
//!
//! Most callers only need [`fit_hyperbola`], [`fit_quadratic`] or, for weighted
//! fits and custom solver settings, [`fit_titration`].

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;

pub use domain::{FitOptions, FitResult, HyperbolaFit, ModelKind, QuadraticFit, Titration};
pub use error::{FitError, InputError};
pub use fit::{fit_batch, fit_hyperbola, fit_quadratic, fit_titration};
pub use models::{hyperbola, quadratic};
