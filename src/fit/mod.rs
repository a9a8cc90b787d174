//! Titration fitting pipeline.
//!
//! Responsibilities:
//!
//! - reject malformed datasets before any numerics (`validate`)
//! - infer intercept/amplitude sign bounds from a linear pre-pass (`bounds`)
//! - run the bounded nonlinear fit and reduce it to estimates (`fitter`)
//! - fit many independent titrations in parallel (`batch`)

pub mod batch;
pub mod bounds;
pub mod fitter;
pub mod validate;

pub use batch::*;
pub use bounds::*;
pub use fitter::*;
pub use validate::*;
