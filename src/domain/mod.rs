//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the binding model enum (`ModelKind`)
//! - titration datasets (`Titration`)
//! - sign bounds derived from the regression pre-pass (`Sign`, `SignBounds`)
//! - fit outputs (`FitResult`, `HyperbolaFit`, `QuadraticFit`)
//! - solver configuration (`FitOptions`)

pub mod types;

pub use types::*;
