//! Input/output helpers.
//!
//! - CSV ingest of titrations (`ingest`)
//! - fit result and titration exports (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
