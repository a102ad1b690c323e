//! Batch orchestrator — runs the single-symbol pipeline across a universe.
//!
//! Symbols are dispatched on a dedicated rayon pool. Each symbol's failure
//! is isolated and reported in its [`SymbolOutcome`]; outcomes come back in
//! input order. A cancel flag is checked before each symbol starts; symbols
//! that never started are reported as cancelled.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use rollcast_core::data::PriceSource;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{BacktestConfig, ConfigError};
use crate::leaderboard::BatchSummary;
use crate::result::StrategyResult;
use crate::runner::{run_series, series_request, RunError};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("no symbols to run")]
    NoSymbols,

    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),
}

/// What happened to one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SymbolOutcome {
    Completed(StrategyResult),
    /// The run finished with fewer than two usable records.
    NoResult { symbol: String, reason: String },
    Failed { symbol: String, error: String },
    Cancelled { symbol: String },
}

impl SymbolOutcome {
    pub fn symbol(&self) -> &str {
        match self {
            SymbolOutcome::Completed(r) => &r.symbol,
            SymbolOutcome::NoResult { symbol, .. }
            | SymbolOutcome::Failed { symbol, .. }
            | SymbolOutcome::Cancelled { symbol } => symbol,
        }
    }

    pub fn result(&self) -> Option<&StrategyResult> {
        match self {
            SymbolOutcome::Completed(r) => Some(r),
            _ => None,
        }
    }

    fn from_run(symbol: &str, outcome: Result<StrategyResult, RunError>) -> Self {
        match outcome {
            Ok(result) => SymbolOutcome::Completed(result),
            Err(e) if e.is_cancelled() => SymbolOutcome::Cancelled {
                symbol: symbol.to_string(),
            },
            Err(e) if e.is_no_result() => SymbolOutcome::NoResult {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            },
            Err(e) => SymbolOutcome::Failed {
                symbol: symbol.to_string(),
                error: e.to_string(),
            },
        }
    }
}

/// Progress snapshot passed to the callback after each symbol.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    pub symbol: String,
    pub finished: usize,
    pub total: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// One entry per input symbol, in input order.
    pub outcomes: Vec<SymbolOutcome>,
    pub summary: BatchSummary,
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

impl BatchReport {
    pub fn results(&self) -> impl Iterator<Item = &StrategyResult> {
        self.outcomes.iter().filter_map(|o| o.result())
    }
}

/// Run every symbol through the pipeline and summarize.
pub fn run_universe(
    source: &dyn PriceSource,
    symbols: &[String],
    config: &BacktestConfig,
    progress: Option<&(dyn Fn(&BatchProgress) + Sync)>,
    cancel: Option<&AtomicBool>,
) -> Result<BatchReport, BatchError> {
    config.validate()?;
    if symbols.is_empty() {
        return Err(BatchError::NoSymbols);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.batch.threads)
        .build()
        .map_err(|e| BatchError::ThreadPool(e.to_string()))?;

    let started = Instant::now();
    let total = symbols.len();
    let finished = AtomicUsize::new(0);
    let completed = AtomicUsize::new(0);
    info!(
        symbols = total,
        model = %config.model,
        window = config.backtest.window,
        threads = pool.current_num_threads(),
        "starting batch"
    );

    let outcomes: Vec<SymbolOutcome> = pool.install(|| {
        symbols
            .par_iter()
            .map(|symbol| {
                if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
                    return SymbolOutcome::Cancelled {
                        symbol: symbol.clone(),
                    };
                }

                let outcome = match source.fetch(&series_request(symbol, config)) {
                    Ok(series) => SymbolOutcome::from_run(
                        symbol,
                        run_series(&series, config, config.batch.parallel_steps, cancel)
                            .map(|run| run.result),
                    ),
                    Err(e) => SymbolOutcome::from_run(symbol, Err(e.into())),
                };
                match &outcome {
                    SymbolOutcome::Failed { error, .. } => {
                        warn!(symbol = %symbol, error = %error, "symbol failed")
                    }
                    SymbolOutcome::NoResult { reason, .. } => {
                        warn!(symbol = %symbol, reason = %reason, "symbol produced no result")
                    }
                    _ => {}
                }

                let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
                let ok = if outcome.result().is_some() {
                    completed.fetch_add(1, Ordering::Relaxed) + 1
                } else {
                    completed.load(Ordering::Relaxed)
                };
                if let Some(cb) = progress {
                    cb(&BatchProgress {
                        symbol: symbol.clone(),
                        finished: done,
                        total,
                        completed: ok,
                    });
                }
                outcome
            })
            .collect()
    });

    let summary = BatchSummary::from_outcomes(&outcomes, config.batch.top_n, config.batch.rank_by);
    let cancelled = cancel.is_some_and(|f| f.load(Ordering::Relaxed));
    let elapsed_ms = started.elapsed().as_millis() as u64;
    info!(
        attempted = summary.attempted,
        completed = summary.completed,
        failed = summary.failed,
        degenerate = summary.degenerate,
        cancelled = summary.cancelled,
        success_rate = summary.success_rate,
        elapsed_ms,
        "batch finished"
    );

    Ok(BatchReport {
        outcomes,
        summary,
        cancelled,
        elapsed_ms,
    })
}
