//! Rollcast Core — price series, forecast models, the rolling engine and
//! signal-to-return translation.
//!
//! This crate contains the heart of the walk-forward backtester:
//! - Domain types (price points, series, windows, forecast records, signals)
//! - Forecast model adapters (ARIMA plus naive, drift and mean baselines)
//! - Rolling engine: refit on a fixed trailing window, forecast one step,
//!   record, advance by one
//! - Translation of directional signals into realized strategy returns
//! - Price sources (CSV directory, synthetic) behind a memoizing cache

pub mod data;
pub mod domain;
pub mod engine;
pub mod model;
pub mod returns;

pub use domain::{ForecastLedger, ForecastRecord, Interval, PricePoint, Signal, TimeSeries};
pub use engine::{run_rolling, run_with_model, BacktestRun, EngineConfig, EngineError};
pub use model::{FitBudget, ModelSpec};
pub use returns::{translate, ReturnSeries};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared with batch worker threads are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<TimeSeries>();
        require_sync::<TimeSeries>();
        require_send::<ForecastLedger>();
        require_sync::<ForecastLedger>();
        require_send::<BacktestRun>();
        require_sync::<BacktestRun>();
        require_send::<ReturnSeries>();
        require_sync::<ReturnSeries>();
        require_send::<ModelSpec>();
        require_sync::<ModelSpec>();
        require_send::<EngineError>();
        require_sync::<EngineError>();
        require_send::<model::Arima>();
        require_sync::<model::Arima>();
        require_send::<data::SeriesCache<data::CsvDirectorySource>>();
        require_sync::<data::SeriesCache<data::SyntheticSource>>();
        require_send::<data::DataUnavailable>();
        require_sync::<data::DataUnavailable>();
    }
}
