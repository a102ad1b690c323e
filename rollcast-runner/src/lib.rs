//! Rollcast Runner — pipeline orchestration, evaluation, rankings and export.
//!
//! This crate builds on `rollcast-core` to provide:
//! - TOML backtest configuration with validation and defaults
//! - Single-symbol pipeline: fetch, rolling engine, translate, evaluate
//! - Forecast-error and strategy-vs-buy-and-hold metrics
//! - Batch orchestration over a symbol universe with failure isolation,
//!   progress reporting and cooperative cancellation
//! - Batch summary with aggregates and top/bottom rankings
//! - CSV, JSON and Markdown artifacts

pub mod batch;
pub mod config;
pub mod export;
pub mod leaderboard;
pub mod metrics;
pub mod result;
pub mod runner;

pub use batch::{run_universe, BatchError, BatchProgress, BatchReport, SymbolOutcome};
pub use config::{BacktestConfig, ConfigError};
pub use export::{save_batch_artifacts, save_run_artifacts};
pub use leaderboard::{Aggregate, BatchSummary, RankedEntry, RankingMetric};
pub use metrics::{evaluate, ErrorMetrics, ReturnMetrics};
pub use result::{StrategyResult, RESULT_COLUMNS, SCHEMA_VERSION};
pub use runner::{run_series, run_symbol, RunError, SymbolRun};
