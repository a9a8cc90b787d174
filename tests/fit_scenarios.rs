use approx::assert_relative_eq;

use binding_fits::data::{SampleConfig, generate_titration, log_space};
use binding_fits::domain::CONCENTRATION_FLOOR;
use binding_fits::error::InputError;
use binding_fits::{
    FitError, FitOptions, ModelKind, Titration, fit_batch, fit_hyperbola, fit_quadratic, fit_titration, hyperbola,
    quadratic,
};

const CONCENTRATIONS: [f64; 9] = [0.0, 10.0, 50.0, 100.0, 150.0, 200.0, 250.0, 280.0, 400.0];
const SIGNALS: [f64; 9] = [0.0, 0.14, 0.30, 0.45, 0.66, 0.75, 0.93, 0.99, 1.0];

#[test]
fn increasing_curve_reference_fit() {
    let fit = fit_hyperbola(&CONCENTRATIONS, &SIGNALS).unwrap();
    assert_relative_eq!(fit.kd.value, 251.01, max_relative = 0.02);
    assert_relative_eq!(fit.kd.stddev, 84.44, max_relative = 0.02);

    let (intercept, intercept_sd, amplitude, amplitude_sd, kd, kd_sd) = fit.to_tuple();
    assert_eq!(kd, fit.kd.value);
    assert_eq!(kd_sd, fit.kd.stddev);
    assert!(intercept >= 0.0 && intercept_sd > 0.0);
    assert!(amplitude > 0.0 && amplitude_sd > 0.0);
}

#[test]
fn decreasing_curve_reference_fit() {
    let mut signals = SIGNALS;
    signals.reverse();
    let fit = fit_hyperbola(&CONCENTRATIONS, &signals).unwrap();
    assert!(fit.amplitude.value < 0.0);
    assert!(fit.intercept.value > 0.0);
    assert!(fit.kd.value > 0.0);
    assert!(fit.kd.stddev > 0.0);
}

#[test]
fn malformed_datasets_are_invalid_input_for_both_models() {
    let c = CONCENTRATIONS.to_vec();
    let s = SIGNALS.to_vec();

    let mut duplicate = c.clone();
    duplicate[2] = duplicate[1];
    let mut with_nan = s.clone();
    with_nan[4] = f64::NAN;
    let mut tiny = c.clone();
    tiny[1] = 1e-60;
    let mut huge = c.clone();
    huge[8] = 1e51;

    let cases: Vec<(&str, Vec<f64>, Vec<f64>)> = vec![
        ("too few points", c[..2].to_vec(), s[..2].to_vec()),
        ("length mismatch", c.clone(), s[..8].to_vec()),
        ("duplicate concentrations", duplicate, s.clone()),
        ("nan signal", c.clone(), with_nan),
        ("tiny concentration", tiny, s.clone()),
        ("huge concentration", huge, s.clone()),
        ("flat signal", c.clone(), vec![0.5; 9]),
    ];

    for (name, conc, sig) in cases {
        let hyper = fit_hyperbola(&conc, &sig).unwrap_err();
        assert!(hyper.is_invalid_input(), "{name}: {hyper}");
        let quad = fit_quadratic(&conc, &sig).unwrap_err();
        assert!(quad.is_invalid_input(), "{name}: {quad}");
    }
}

#[test]
fn first_violated_rule_is_reported() {
    // Too few points and a NaN: the count check runs first.
    let err = fit_hyperbola(&[0.0, f64::NAN], &[0.0, 1.0]).unwrap_err();
    assert_eq!(err, FitError::InvalidInput(InputError::TooFewPoints { min: 3, found: 2 }));
}

#[test]
fn repeated_fits_are_identical() {
    let a = fit_quadratic(&CONCENTRATIONS, &SIGNALS).unwrap();
    let b = fit_quadratic(&CONCENTRATIONS, &SIGNALS).unwrap();
    assert_eq!(a, b);
}

#[test]
fn quadratic_recovers_known_parameters() {
    let c = [0.0, 2.0, 4.0, 6.0, 8.0, 10.0, 12.0, 15.0, 20.0, 30.0, 50.0];
    let y = quadratic(&c, 0.05, 1.0, 0.5, 10.0);
    let fit = fit_quadratic(&c, &y).unwrap();
    assert_relative_eq!(fit.intercept.value, 0.05, epsilon = 1e-6);
    assert_relative_eq!(fit.amplitude.value, 1.0, max_relative = 1e-5);
    assert_relative_eq!(fit.kd.value, 0.5, max_relative = 1e-3);
    assert_relative_eq!(fit.constant.value, 10.0, max_relative = 1e-4);
}

#[test]
fn zero_dispersions_fall_back_to_uniform_weights() {
    let plain = Titration::new(CONCENTRATIONS.to_vec(), SIGNALS.to_vec());
    let zeroed = plain.clone().with_dispersions(vec![0.0; 9]);
    let opts = FitOptions::default();
    let a = fit_titration(ModelKind::Hyperbola, &plain, &opts).unwrap();
    let b = fit_titration(ModelKind::Hyperbola, &zeroed, &opts).unwrap();
    assert_eq!(a, b);
}

#[test]
fn weighted_fit_of_simulated_replicates_recovers_kd() {
    let mut concentrations = log_space(1.0, 1000.0, 12).unwrap();
    concentrations.insert(0, 0.0);
    let config = SampleConfig {
        model: ModelKind::Hyperbola,
        params: vec![0.2, 1.5, 40.0],
        concentrations,
        noise_sd: 0.01,
        replicates: 4,
        seed: 11,
    };
    let titration = generate_titration(&config).unwrap();
    let result = fit_titration(ModelKind::Hyperbola, &titration, &FitOptions::default()).unwrap();
    assert!(result.quality.weighted);

    let kd = result.estimate("kd").unwrap();
    assert_relative_eq!(kd.value, 40.0, max_relative = 0.1);
    assert!(kd.stddev > 0.0);
}

#[test]
fn batch_matches_individual_fits_in_order() {
    let mut reversed = SIGNALS;
    reversed.reverse();
    let titrations = vec![
        Titration::new(CONCENTRATIONS.to_vec(), SIGNALS.to_vec()),
        Titration::new(CONCENTRATIONS.to_vec(), vec![1.0; 9]),
        Titration::new(CONCENTRATIONS.to_vec(), reversed.to_vec()),
    ];
    let opts = FitOptions::default();
    let batch = fit_batch(ModelKind::Hyperbola, &titrations, &opts);

    assert_eq!(batch.len(), 3);
    assert_eq!(batch[0], fit_titration(ModelKind::Hyperbola, &titrations[0], &opts));
    assert!(batch[1].as_ref().unwrap_err().is_invalid_input());
    assert_eq!(batch[2], fit_titration(ModelKind::Hyperbola, &titrations[2], &opts));
}

#[test]
fn evaluation_budget_is_enforced() {
    let t = Titration::new(CONCENTRATIONS.to_vec(), SIGNALS.to_vec());
    let opts = FitOptions {
        patience: 1,
        ftol: 0.0,
        xtol: 0.0,
        gtol: 0.0,
        ..FitOptions::default()
    };
    let err = fit_titration(ModelKind::Hyperbola, &t, &opts).unwrap_err();
    assert!(matches!(err, FitError::NoConvergence { .. }), "{err}");
}

const TITRATION_STEPS: [f64; 9] = [0.0, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0];
const UNIT_SCALES: [f64; 6] = [1e-9, 1e-6, 1e-3, 1.0, 1e3, 1e6];

fn scaled_concentrations(scale: f64, baseline: bool) -> Vec<f64> {
    let skip = if baseline { 0 } else { 1 };
    TITRATION_STEPS[skip..].iter().map(|v| v * scale).collect()
}

#[test]
fn hyperbola_fits_are_unit_independent() {
    for scale in UNIT_SCALES {
        for baseline in [true, false] {
            let c = scaled_concentrations(scale, baseline);
            let kd = 30.0 * scale;
            let y = hyperbola(&c, 100.0, 1000.0, kd);
            let fit = fit_hyperbola(&c, &y).unwrap_or_else(|e| panic!("scale {scale}, baseline {baseline}: {e}"));
            assert_relative_eq!(fit.kd.value, kd, max_relative = 1e-4);
            assert_relative_eq!(fit.amplitude.value, 1000.0, max_relative = 1e-5);
            assert_relative_eq!(fit.intercept.value, 100.0, max_relative = 1e-5);
        }
    }
}

#[test]
fn quadratic_fits_are_unit_independent() {
    for scale in UNIT_SCALES {
        for baseline in [true, false] {
            let c = scaled_concentrations(scale, baseline);
            let (kd, constant) = (50.0 * scale, 100.0 * scale);
            let y = quadratic(&c, 100.0, 1000.0, kd, constant);
            let fit = fit_quadratic(&c, &y).unwrap_or_else(|e| panic!("scale {scale}, baseline {baseline}: {e}"));
            assert_relative_eq!(fit.kd.value, kd, max_relative = 1e-3);
            assert_relative_eq!(fit.constant.value, constant, max_relative = 1e-3);
            assert_relative_eq!(fit.amplitude.value, 1000.0, max_relative = 1e-4);
            assert!(fit.kd.stddev.is_finite() && fit.constant.stddev.is_finite());
        }
    }
}

#[test]
fn stoichiometric_titration_drives_kd_to_the_floor() {
    let c = scaled_concentrations(1e-9, true);
    let constant = 8e-8;
    let y = quadratic(&c, 100.0, 1000.0, CONCENTRATION_FLOOR, constant);
    let fit = fit_quadratic(&c, &y).unwrap();
    assert!(fit.kd.value >= CONCENTRATION_FLOOR);
    assert!(fit.kd.value < 0.05 * constant, "kd = {}", fit.kd.value);
    assert_relative_eq!(fit.constant.value, constant, max_relative = 0.05);
    assert_relative_eq!(fit.amplitude.value, 1000.0, max_relative = 0.01);
}
