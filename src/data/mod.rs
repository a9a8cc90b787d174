//! Data sources other than files on disk.
//!
//! - synthetic titrations for demos and tests (`sample`)

pub mod sample;

pub use sample::*;
