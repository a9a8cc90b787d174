//! Synthetic titration generation.
//!
//! A titration is simulated by evaluating a binding model at each concentration
//! and adding Gaussian read noise to every replicate. Replicates are collapsed
//! into mean signal plus sample standard deviation, exactly as measured data is,
//! so simulated titrations exercise the weighted fit path too.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use thiserror::Error;

use crate::domain::{ModelKind, Titration};
use crate::error::InputError;
use crate::models::predict;

/// Invalid simulation settings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    #[error("{model} takes {expected} parameters, got {found}")]
    ParamCount {
        model: ModelKind,
        expected: usize,
        found: usize,
    },

    #[error("parameters must be finite, got {0:?}")]
    NonFiniteParams(Vec<f64>),

    #[error("noise sd must be finite and non-negative, got {0}")]
    InvalidNoise(f64),

    #[error("at least one replicate per concentration is required")]
    NoReplicates,

    #[error("no concentrations to simulate")]
    NoConcentrations,

    #[error("invalid log range: min={min}, max={max} (must be finite, >0, and max>min)")]
    InvalidRange { min: f64, max: f64 },

    #[error("log range needs at least 2 steps, got {0}")]
    TooFewSteps(usize),

    #[error(transparent)]
    Input(#[from] InputError),
}

/// Settings for one simulated titration.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleConfig {
    pub model: ModelKind,
    /// Model parameters in `ModelKind::param_names` order.
    pub params: Vec<f64>,
    pub concentrations: Vec<f64>,
    /// Standard deviation of the additive read noise.
    pub noise_sd: f64,
    /// Reads per concentration.
    pub replicates: usize,
    pub seed: u64,
}

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, SampleError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > min) {
        return Err(SampleError::InvalidRange { min, max });
    }
    if steps < 2 {
        return Err(SampleError::TooFewSteps(steps));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    // Pin the end points so callers can rely on the exact range.
    out[0] = min;
    out[steps - 1] = max;
    Ok(out)
}

/// Simulate a titration.
///
/// The same configuration (seed included) always yields the same titration.
pub fn generate_titration(config: &SampleConfig) -> Result<Titration, SampleError> {
    let expected = config.model.param_count();
    if config.params.len() != expected {
        return Err(SampleError::ParamCount {
            model: config.model,
            expected,
            found: config.params.len(),
        });
    }
    if !config.params.iter().all(|p| p.is_finite()) {
        return Err(SampleError::NonFiniteParams(config.params.clone()));
    }
    if !(config.noise_sd.is_finite() && config.noise_sd >= 0.0) {
        return Err(SampleError::InvalidNoise(config.noise_sd));
    }
    if config.replicates == 0 {
        return Err(SampleError::NoReplicates);
    }
    if config.concentrations.is_empty() {
        return Err(SampleError::NoConcentrations);
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let noise = Normal::new(0.0, config.noise_sd).map_err(|_| SampleError::InvalidNoise(config.noise_sd))?;

    let reads: Vec<Vec<f64>> = config
        .concentrations
        .iter()
        .map(|&c| {
            let truth = predict(config.model, c, &config.params);
            (0..config.replicates)
                .map(|_| truth + noise.sample(&mut rng))
                .collect()
        })
        .collect();

    Ok(Titration::from_replicates(config.concentrations.clone(), &reads)?)
}
