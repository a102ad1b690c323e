//! Rolling engine scenarios: level shift, degenerate windows, skipped steps,
//! sequential/parallel equivalence.

use chrono::NaiveDate;
use rollcast_core::data::{PriceSource, SeriesRequest, SyntheticSource};
use rollcast_core::domain::{Interval, Signal, TimeSeries, WindowSlice};
use rollcast_core::engine::{run_rolling, run_with_model, EngineConfig, EngineError};
use rollcast_core::model::{FittedModel, ForecastModel, ModelFitError, ModelSpec};
use rollcast_core::returns::{translate, TranslateError};

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 3).unwrap()
}

fn series(prices: &[f64]) -> TimeSeries {
    TimeSeries::from_prices("TEST", Interval::Weekly, start(), prices).unwrap()
}

/// 120 points at 100.0, jumping 10% to 110.0 at index 115.
fn level_shift() -> TimeSeries {
    let prices: Vec<f64> = (0..120).map(|i| if i < 115 { 100.0 } else { 110.0 }).collect();
    series(&prices)
}

#[derive(Debug)]
struct Fixed(f64);

impl FittedModel for Fixed {
    fn predict_next(&self) -> f64 {
        self.0
    }
}

/// Fails whenever the forecast target has an even index.
#[derive(Debug)]
struct EvenStepsFail;

impl ForecastModel for EvenStepsFail {
    fn name(&self) -> String {
        "EVEN-FAIL".into()
    }

    fn fit(&self, window: &WindowSlice<'_>) -> Result<Box<dyn FittedModel>, ModelFitError> {
        if window.end_index() % 2 == 0 {
            return Err(ModelFitError::Singular);
        }
        let last = window.last().map(|p| p.price).unwrap_or_default();
        Ok(Box::new(Fixed(last * 1.01)))
    }
}

#[derive(Debug)]
struct NanModel;

impl ForecastModel for NanModel {
    fn name(&self) -> String {
        "NAN".into()
    }

    fn fit(&self, _window: &WindowSlice<'_>) -> Result<Box<dyn FittedModel>, ModelFitError> {
        Ok(Box::new(Fixed(f64::NAN)))
    }
}

#[test]
fn level_shift_with_naive_model() {
    let series = level_shift();
    let run = run_rolling(&series, 100, &ModelSpec::Naive, &EngineConfig::default(), None).unwrap();

    assert_eq!(run.ledger.len(), 20);
    assert_eq!(run.metadata.first_step, 100);
    assert_eq!(run.metadata.model, "NAIVE");

    // Forecast equals the reference every time, so every call is Short.
    assert!(run.ledger.iter().all(|r| r.signal == Signal::Short));
    let at_jump = run.ledger.iter().find(|r| r.step_index == 115).unwrap();
    assert_eq!(at_jump.actual_price, 110.0);
    assert_eq!(at_jump.predicted_price, 100.0);

    let returns = translate(&run.ledger).unwrap();
    assert_eq!(returns.len(), 19);
    let buy_hold: f64 = returns.actual_returns().iter().sum();
    let strategy: f64 = returns.strategy_returns().iter().sum();
    assert!((buy_hold - 0.10).abs() < 1e-12);
    assert!((strategy + 0.10).abs() < 1e-12);
}

#[test]
fn series_equal_to_window_is_insufficient() {
    let series = series(&[100.0; 100]);
    let err = run_rolling(&series, 100, &ModelSpec::Naive, &EngineConfig::default(), None).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InsufficientData {
            required: 101,
            available: 100,
            ..
        }
    ));
}

#[test]
fn constant_series_skips_every_arima_step() {
    let series = series(&[100.0; 130]);
    let run = run_rolling(&series, 100, &ModelSpec::default(), &EngineConfig::default(), None).unwrap();
    assert!(run.ledger.is_empty());
    assert_eq!(run.metadata.skipped_steps(), 30);
    assert!(run
        .metadata
        .skipped
        .iter()
        .all(|s| s.reason == ModelFitError::InsufficientVariation));
    assert_eq!(
        translate(&run.ledger),
        Err(TranslateError::InsufficientRecords { found: 0 })
    );
}

#[test]
fn failed_steps_are_skipped_not_fatal() {
    let prices: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
    let series = series(&prices);
    let run = run_with_model(&series, 10, &EvenStepsFail, &EngineConfig::default(), None).unwrap();

    assert_eq!(run.metadata.total_steps, 20);
    assert_eq!(run.ledger.len(), 10);
    assert_eq!(run.metadata.recorded_steps(), 10);
    assert_eq!(
        run.metadata.skipped_indices(),
        (10..30).step_by(2).collect::<Vec<_>>()
    );
    assert!(run.ledger.iter().all(|r| r.step_index % 2 == 1));
    assert!(run.ledger.iter().all(|r| r.signal == Signal::Long));
    let dates: Vec<_> = run.ledger.iter().map(|r| r.date).collect();
    assert!(dates.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn non_finite_forecast_is_skipped() {
    let series = series(&[1.0, 2.0, 3.0, 4.0]);
    let run = run_with_model(&series, 2, &NanModel, &EngineConfig::default(), None).unwrap();
    assert!(run.ledger.is_empty());
    assert_eq!(run.metadata.skipped.len(), 2);
    assert_eq!(run.metadata.skipped[0].reason, ModelFitError::NonFinite);
    assert_eq!(run.metadata.period_start, None);
}

#[test]
fn parallel_matches_sequential() {
    let request = SeriesRequest::new(
        "SYN",
        start(),
        NaiveDate::from_ymd_opt(2023, 6, 30).unwrap(),
        Interval::Weekly,
    );
    let series = SyntheticSource::new(11).fetch(&request).unwrap();
    assert!(series.len() > 150);

    let spec = ModelSpec::default();
    let sequential = run_rolling(&series, 100, &spec, &EngineConfig::default(), None).unwrap();
    let parallel_config = EngineConfig {
        parallel: true,
        ..EngineConfig::default()
    };
    let parallel = run_rolling(&series, 100, &spec, &parallel_config, None).unwrap();

    assert_eq!(sequential.ledger, parallel.ledger);
    assert_eq!(sequential.metadata, parallel.metadata);
}

#[test]
fn repeated_runs_are_identical() {
    let prices: Vec<f64> = (0..90)
        .map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0 + i as f64 * 0.1)
        .collect();
    let series = series(&prices);
    let spec = ModelSpec::Arima { p: 1, d: 1, q: 1 };
    let a = run_rolling(&series, 40, &spec, &EngineConfig::default(), None).unwrap();
    let b = run_rolling(&series, 40, &spec, &EngineConfig::default(), None).unwrap();
    assert_eq!(a.ledger, b.ledger);
    assert_eq!(a.metadata.skipped, b.metadata.skipped);
}

#[test]
fn first_step_starts_test_period_later() {
    let series = level_shift();
    let config = EngineConfig {
        first_step: Some(110),
        ..EngineConfig::default()
    };
    let run = run_rolling(&series, 100, &ModelSpec::Drift, &config, None).unwrap();
    assert_eq!(run.ledger.len(), 10);
    assert_eq!(run.ledger.first().unwrap().step_index, 110);
}
