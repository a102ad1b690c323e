//! Strategy result — the per-symbol record a completed run produces.

use chrono::NaiveDate;
use rollcast_core::domain::Interval;
use serde::{Deserialize, Serialize};

/// Version of the persisted result layout. Bumped on breaking changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Column order of the results table, one row per [`StrategyResult`].
pub const RESULT_COLUMNS: [&str; 26] = [
    "symbol",
    "model",
    "interval",
    "window",
    "period_start",
    "period_end",
    "sample_count",
    "skipped_steps",
    "mse",
    "rmse",
    "mae",
    "mape",
    "buy_hold_return",
    "strategy_return",
    "outperformance",
    "win_rate",
    "avg_win",
    "avg_loss",
    "compounded_strategy_return",
    "compounded_buy_hold_return",
    "sharpe",
    "buy_hold_sharpe",
    "max_drawdown",
    "momentum_return",
    "momentum_sharpe",
    "outperformance_vs_momentum",
];

/// Aggregate outcome of one symbol's rolling backtest.
///
/// Returns and rates are in percent. `strategy_return` is the additive sum
/// of per-period strategy returns and is the figure `outperformance` is
/// measured against; `buy_hold_return` is point-to-point over the test
/// period. The compounded variants are reported alongside for reference.
/// The momentum fields score a benchmark that goes long after a rising
/// period and short otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyResult {
    pub schema_version: u32,
    pub symbol: String,
    /// Model label, e.g. `ARIMA(2,1,2)`.
    pub model: String,
    pub interval: Interval,
    pub window: usize,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    /// Number of forecast records.
    pub sample_count: usize,
    pub skipped_steps: usize,
    /// Number of per-period returns behind the return metrics.
    pub return_points: usize,

    // Forecast error
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub mape: f64,
    pub mape_excluded_points: usize,

    // Strategy vs buy-and-hold
    pub buy_hold_return: f64,
    pub strategy_return: f64,
    pub outperformance: f64,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,

    // Supplementary
    pub compounded_strategy_return: f64,
    pub compounded_buy_hold_return: f64,
    pub sharpe: f64,
    pub buy_hold_sharpe: f64,
    pub max_drawdown: f64,

    // Momentum benchmark
    #[serde(default)]
    pub momentum_return: f64,
    #[serde(default)]
    pub momentum_sharpe: f64,
    #[serde(default)]
    pub outperformance_vs_momentum: f64,
}

impl StrategyResult {
    /// Values in [`RESULT_COLUMNS`] order.
    pub fn to_row(&self) -> Vec<String> {
        let f = |v: f64| format!("{v:.6}");
        vec![
            self.symbol.clone(),
            self.model.clone(),
            self.interval.to_string(),
            self.window.to_string(),
            self.period_start.to_string(),
            self.period_end.to_string(),
            self.sample_count.to_string(),
            self.skipped_steps.to_string(),
            f(self.mse),
            f(self.rmse),
            f(self.mae),
            f(self.mape),
            f(self.buy_hold_return),
            f(self.strategy_return),
            f(self.outperformance),
            f(self.win_rate),
            f(self.avg_win),
            f(self.avg_loss),
            f(self.compounded_strategy_return),
            f(self.compounded_buy_hold_return),
            f(self.sharpe),
            f(self.buy_hold_sharpe),
            f(self.max_drawdown),
            f(self.momentum_return),
            f(self.momentum_sharpe),
            f(self.outperformance_vs_momentum),
        ]
    }

    pub fn beat_buy_hold(&self) -> bool {
        self.outperformance > 0.0
    }
}
