//! Command-line parsing for the `bindfit` binary.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! fitting code: everything here is plain data handed to `app`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::ModelKind;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "bindfit", version, about = "Binding curve fitter for titration data")]
pub struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a binding model to one or more titration CSV files.
    Fit(FitArgs),
    /// Generate a synthetic titration from known parameters.
    Simulate(SimulateArgs),
    /// Evaluate a model at the given concentrations.
    Eval(EvalArgs),
}

/// Options for `bindfit fit`.
#[derive(Debug, Clone, Args)]
pub struct FitArgs {
    /// Titration CSV files (`concentration` column plus signal columns).
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Binding model to fit.
    #[arg(long, value_enum, default_value_t = ModelKind::Hyperbola)]
    pub model: ModelKind,

    /// Weight points by the replicate standard deviation (or `sd` column).
    #[arg(long)]
    pub weighted: bool,

    /// Print results as JSON instead of a table.
    #[arg(long)]
    pub json: bool,

    /// Export results (with a sampled fitted curve) to JSON.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,

    /// Give up after `patience · (parameters + 1)` model evaluations.
    #[arg(long, default_value_t = 200)]
    pub patience: usize,

    /// Initial solver step bound, relative to the scaled parameter norm.
    #[arg(long, default_value_t = 100.0)]
    pub stepbound: f64,

    /// Relative cost-reduction tolerance.
    #[arg(long, default_value_t = 1e-8)]
    pub ftol: f64,

    /// Relative step-size tolerance.
    #[arg(long, default_value_t = 1e-8)]
    pub xtol: f64,

    /// Gradient orthogonality tolerance.
    #[arg(long, default_value_t = 1e-8)]
    pub gtol: f64,
}

/// Options for `bindfit simulate`.
#[derive(Debug, Clone, Args)]
pub struct SimulateArgs {
    /// Binding model to simulate.
    #[arg(long, value_enum, default_value_t = ModelKind::Hyperbola)]
    pub model: ModelKind,

    /// Model parameters, comma separated (intercept,amplitude,kd[,constant]).
    #[arg(long, required = true, value_delimiter = ',', allow_hyphen_values = true)]
    pub params: Vec<f64>,

    /// Explicit concentrations, comma separated.
    #[arg(long, value_delimiter = ',', conflicts_with = "log_range", required_unless_present = "log_range")]
    pub concentrations: Vec<f64>,

    /// Log-spaced concentrations as `min,max,steps`.
    #[arg(long, value_parser = parse_log_range)]
    pub log_range: Option<LogRange>,

    /// Prepend a zero-concentration baseline point.
    #[arg(long)]
    pub with_zero: bool,

    /// Standard deviation of Gaussian read noise.
    #[arg(long, default_value_t = 0.0)]
    pub noise_sd: f64,

    /// Reads per concentration.
    #[arg(long, default_value_t = 1)]
    pub replicates: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Write the titration CSV here instead of stdout.
    #[arg(long, value_name = "CSV")]
    pub output: Option<PathBuf>,
}

/// Options for `bindfit eval`.
#[derive(Debug, Clone, Args)]
pub struct EvalArgs {
    /// Binding model to evaluate.
    #[arg(long, value_enum, default_value_t = ModelKind::Hyperbola)]
    pub model: ModelKind,

    /// Model parameters, comma separated.
    #[arg(long, required = true, value_delimiter = ',', allow_hyphen_values = true)]
    pub params: Vec<f64>,

    /// Concentrations, comma separated.
    #[arg(long, required = true, value_delimiter = ',')]
    pub concentrations: Vec<f64>,
}

/// `min,max,steps` for a log-spaced concentration series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogRange {
    pub min: f64,
    pub max: f64,
    pub steps: usize,
}

fn parse_log_range(s: &str) -> Result<LogRange, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [min, max, steps] = parts.as_slice() else {
        return Err(format!("expected `min,max,steps`, got '{s}'"));
    };
    let min = min.parse::<f64>().map_err(|e| format!("invalid min '{min}': {e}"))?;
    let max = max.parse::<f64>().map_err(|e| format!("invalid max '{max}': {e}"))?;
    let steps = steps
        .parse::<usize>()
        .map_err(|e| format!("invalid steps '{steps}': {e}"))?;
    Ok(LogRange { min, max, steps })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_args_parse_with_defaults() {
        let cli = Cli::parse_from(["bindfit", "fit", "a.csv", "b.csv", "--model", "quadratic"]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.files.len(), 2);
        assert_eq!(args.model, ModelKind::Quadratic);
        assert!(!args.weighted);
        assert_eq!(args.patience, 200);
        assert_eq!(args.stepbound, 100.0);
        assert_eq!(cli.log_level, tracing::Level::WARN);
    }

    #[test]
    fn simulate_accepts_negative_params_and_log_range() {
        let cli = Cli::parse_from([
            "bindfit",
            "--log-level",
            "debug",
            "simulate",
            "--params",
            "1,-0.5,20",
            "--log-range",
            "1,1000,7",
        ]);
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.params, vec![1.0, -0.5, 20.0]);
        assert_eq!(
            args.log_range,
            Some(LogRange {
                min: 1.0,
                max: 1000.0,
                steps: 7
            })
        );
        assert!(args.concentrations.is_empty());
        assert_eq!(cli.log_level, tracing::Level::DEBUG);
    }

    #[test]
    fn log_range_needs_three_fields() {
        assert!(parse_log_range("1,10").is_err());
        assert!(parse_log_range("1,10,x").is_err());
    }

    #[test]
    fn fit_requires_a_file() {
        assert!(Cli::try_parse_from(["bindfit", "fit"]).is_err());
    }
}
