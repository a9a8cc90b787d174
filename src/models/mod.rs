//! Binding model implementations.
//!
//! Models are small, pure functions so the fitting pipeline can stay generic over
//! `ModelKind`.

pub mod model;

pub use model::*;
