//! Numerical building blocks: the regression pre-pass, the sign-bounded
//! adapter over the `levenberg-marquardt` crate and covariance estimation.

pub mod covariance;
pub mod lm;
pub mod ols;

pub use covariance::*;
pub use lm::*;
pub use ols::*;
