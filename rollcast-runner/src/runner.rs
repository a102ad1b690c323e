//! Single-symbol pipeline: fetch → rolling engine → translate → evaluate.

use std::sync::atomic::AtomicBool;

use rollcast_core::data::{DataUnavailable, PriceSource, SeriesRequest};
use rollcast_core::domain::TimeSeries;
use rollcast_core::engine::{run_rolling, BacktestRun, EngineError};
use rollcast_core::returns::{translate, ReturnSeries, TranslateError};
use thiserror::Error;
use tracing::info;

use crate::config::{BacktestConfig, ConfigError};
use crate::metrics::evaluate;
use crate::result::StrategyResult;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("data unavailable: {0}")]
    Data(#[from] DataUnavailable),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("no usable result: {0}")]
    NoResult(#[from] TranslateError),
}

impl RunError {
    /// The run completed but produced too few records to evaluate.
    pub fn is_no_result(&self) -> bool {
        matches!(self, RunError::NoResult(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunError::Engine(EngineError::Cancelled { .. }))
    }
}

/// Everything a single-symbol run produced.
#[derive(Debug, Clone)]
pub struct SymbolRun {
    pub result: StrategyResult,
    pub run: BacktestRun,
    pub returns: ReturnSeries,
}

/// The request a config implies for `symbol`.
pub fn series_request(symbol: &str, config: &BacktestConfig) -> SeriesRequest {
    SeriesRequest::new(
        symbol,
        config.backtest.start_date,
        config.backtest.end_date,
        config.backtest.interval,
    )
}

/// Validate the config, load the series and run the full pipeline.
pub fn run_symbol(
    source: &dyn PriceSource,
    symbol: &str,
    config: &BacktestConfig,
    cancel: Option<&AtomicBool>,
) -> Result<SymbolRun, RunError> {
    config.validate()?;
    let series = source.fetch(&series_request(symbol, config))?;
    run_series(&series, config, config.batch.parallel_steps, cancel)
}

/// Run the pipeline on an already loaded series. The config is assumed valid.
pub fn run_series(
    series: &TimeSeries,
    config: &BacktestConfig,
    parallel: bool,
    cancel: Option<&AtomicBool>,
) -> Result<SymbolRun, RunError> {
    let engine_config = config.engine_config(series.len(), parallel);
    let run = run_rolling(
        series,
        config.backtest.window,
        &config.model,
        &engine_config,
        cancel,
    )?;
    let returns = translate(&run.ledger)?;
    let result = evaluate(&run.ledger, &returns, &run.metadata);

    info!(
        symbol = %result.symbol,
        model = %result.model,
        samples = result.sample_count,
        skipped = result.skipped_steps,
        strategy_return = result.strategy_return,
        buy_hold_return = result.buy_hold_return,
        "symbol evaluated"
    );
    Ok(SymbolRun {
        result,
        run,
        returns,
    })
}
