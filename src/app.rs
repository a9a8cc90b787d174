//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and installs logging
//! - loads titrations and runs the fit pipeline
//! - prints results and writes optional exports
//! - simulates and evaluates models for quick experiments

use std::fmt::Write as _;
use std::path::Path;

use clap::Parser;
use tracing::{info, warn};

use crate::cli::{Cli, Command, EvalArgs, FitArgs, SimulateArgs};
use crate::data::{SampleConfig, generate_titration, log_space};
use crate::domain::{FitFile, FitOptions, FitResult, ModelKind};
use crate::error::AppError;
use crate::io::{fit_file, write_fit_json, write_titration, write_titration_csv};
use crate::models::{hyperbola, quadratic};

pub mod pipeline;

/// Entry point for the `bindfit` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    // Logs go to stderr so JSON and CSV on stdout stay clean.
    let _ = tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Simulate(args) => handle_simulate(args),
        Command::Eval(args) => handle_eval(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let options = fit_options_from_args(&args);
    options.validate().map_err(|e| AppError::usage(e.to_string()))?;

    let job = pipeline::FitJob {
        model: args.model,
        files: args.files.clone(),
        options,
    };
    let runs = pipeline::run_fit(&job)?;

    let mut failed: Option<(u8, usize)> = None;
    let mut exports: Vec<FitFile> = Vec::with_capacity(runs.len());
    for run in &runs {
        match &run.outcome {
            Ok(result) => {
                info!(
                    path = %run.source.display(),
                    evaluations = result.quality.evaluations,
                    ssr = result.quality.ssr,
                    "fit complete"
                );
                exports.push(fit_file(result, &run.titration, Some(&run.source)));
                if !args.json {
                    println!("{}", format_fit(&run.source, result));
                }
            }
            Err(err) => {
                let err = AppError::from(err.clone()).context(run.source.display());
                warn!(path = %run.source.display(), "fit failed");
                eprintln!("{err}");
                let (_, count) = failed.get_or_insert((err.exit_code(), 0));
                *count += 1;
            }
        }
    }

    if args.json {
        let json = serde_json::to_string_pretty(&exports)
            .map_err(|e| AppError::usage(format!("Failed to serialize results: {e}")))?;
        println!("{json}");
    }
    if let Some(path) = &args.export {
        write_fit_json(path, &exports)?;
        info!(path = %path.display(), fits = exports.len(), "exported results");
    }

    // The first failure decides the exit code.
    match failed {
        Some((code, count)) => Err(AppError::new(code, format!("{count} of {} fits failed", runs.len()))),
        None => Ok(()),
    }
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let mut concentrations = match args.log_range {
        Some(range) => {
            log_space(range.min, range.max, range.steps).map_err(|e| AppError::usage(e.to_string()))?
        }
        None => args.concentrations.clone(),
    };
    if args.with_zero {
        concentrations.insert(0, 0.0);
    }

    let config = SampleConfig {
        model: args.model,
        params: args.params.clone(),
        concentrations,
        noise_sd: args.noise_sd,
        replicates: args.replicates,
        seed: args.seed,
    };
    let titration = generate_titration(&config).map_err(|e| AppError::usage(e.to_string()))?;
    info!(points = titration.len(), seed = args.seed, "simulated titration");

    match &args.output {
        Some(path) => write_titration_csv(path, &titration),
        None => write_titration(std::io::stdout().lock(), &titration),
    }
}

fn handle_eval(args: EvalArgs) -> Result<(), AppError> {
    let p = &args.params;
    let c = &args.concentrations;
    let values = match (args.model, p.as_slice()) {
        (ModelKind::Hyperbola, &[intercept, amplitude, kd]) => hyperbola(c, intercept, amplitude, kd),
        (ModelKind::Quadratic, &[intercept, amplitude, kd, constant]) => {
            quadratic(c, intercept, amplitude, kd, constant)
        }
        (model, _) => {
            return Err(AppError::usage(format!(
                "{model} takes {} parameters ({}), got {}",
                model.param_count(),
                model.param_names().join(","),
                p.len()
            )));
        }
    };

    println!("concentration,signal");
    for (c, y) in c.iter().zip(values) {
        println!("{c},{y}");
    }
    Ok(())
}

pub fn fit_options_from_args(args: &FitArgs) -> FitOptions {
    FitOptions {
        patience: args.patience,
        ftol: args.ftol,
        xtol: args.xtol,
        gtol: args.gtol,
        stepbound: args.stepbound,
        weighted: args.weighted,
    }
}

/// Human-readable summary of one fit, parameters in result order.
pub fn format_fit(source: &Path, result: &FitResult) -> String {
    let q = &result.quality;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}: {} fit ({} points, {})",
        source.display(),
        result.model,
        q.n,
        if q.weighted { "weighted" } else { "unweighted" }
    );
    for (name, est) in result.model.param_names().iter().zip(&result.params) {
        let _ = writeln!(out, "  {name:<10} {:>14.6} ± {:<14.6}", est.value, est.stddev);
    }
    let _ = write!(
        out,
        "  ssr = {:.6e}, dof = {}, evaluations = {}, termination = {:?}",
        q.ssr, q.dof, q.evaluations, q.termination
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Estimate, FitQuality, Sign, SignBounds};
    use crate::math::Termination;

    #[test]
    fn options_follow_flags() {
        let cli = Cli::parse_from(["bindfit", "fit", "a.csv", "--weighted", "--patience", "50", "--ftol", "1e-6"]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let opts = fit_options_from_args(&args);
        assert!(opts.weighted);
        assert_eq!(opts.patience, 50);
        assert_eq!(opts.stepbound, 100.0);
        assert_eq!(opts.ftol, 1e-6);
        assert_eq!(opts.xtol, 1e-8);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn summary_lists_parameters_in_order() {
        let result = FitResult {
            model: ModelKind::Quadratic,
            params: (1..=4)
                .map(|i| Estimate {
                    value: i as f64,
                    stddev: 0.5,
                })
                .collect(),
            bounds: SignBounds {
                intercept: Sign::NonNegative,
                amplitude: Sign::NonNegative,
            },
            quality: FitQuality {
                ssr: 1e-3,
                n: 8,
                dof: 4,
                evaluations: 12,
                termination: Termination::Gradient,
                weighted: true,
            },
        };
        let text = format_fit(Path::new("t.csv"), &result);
        let names: Vec<usize> = ["intercept", "amplitude", "kd", "constant"]
            .iter()
            .map(|n| text.find(n).unwrap())
            .collect();
        assert!(names.windows(2).all(|w| w[0] < w[1]));
        assert!(text.starts_with("t.csv: quadratic fit (8 points, weighted)"));
    }
}
