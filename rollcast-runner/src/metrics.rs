//! Performance metrics — pure functions that compute forecast and strategy
//! statistics.
//!
//! Every metric is a pure function: prices and/or returns in, scalar out.
//! [`evaluate`] assembles them into a [`StrategyResult`]. Returns and rates
//! in the result are percentages; per-period inputs are fractions.

use rollcast_core::domain::ForecastLedger;
use rollcast_core::engine::RunMetadata;
use rollcast_core::returns::ReturnSeries;

use crate::result::{StrategyResult, SCHEMA_VERSION};

/// Forecast error statistics over a ledger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub mape: f64,
    pub mape_excluded_points: usize,
}

impl ErrorMetrics {
    pub fn compute(ledger: &ForecastLedger) -> Self {
        let actual = ledger.actual_prices();
        let predicted = ledger.predicted_prices();
        let mse = mean_squared_error(&actual, &predicted);
        let (mape, mape_excluded_points) = mean_absolute_percentage_error(&actual, &predicted);
        Self {
            mse,
            rmse: mse.sqrt(),
            mae: mean_absolute_error(&actual, &predicted),
            mape,
            mape_excluded_points,
        }
    }
}

/// Strategy statistics versus buy-and-hold, all in percent except ratios.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnMetrics {
    pub buy_hold_return: f64,
    pub strategy_return: f64,
    pub outperformance: f64,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub compounded_strategy_return: f64,
    pub compounded_buy_hold_return: f64,
    pub sharpe: f64,
    pub buy_hold_sharpe: f64,
    pub max_drawdown: f64,
    /// Additive return of the momentum benchmark.
    pub momentum_return: f64,
    pub momentum_sharpe: f64,
    pub outperformance_vs_momentum: f64,
}

impl ReturnMetrics {
    pub fn compute(ledger: &ForecastLedger, returns: &ReturnSeries, periods_per_year: f64) -> Self {
        let strategy = returns.strategy_returns();
        let actual = returns.actual_returns();
        let buy_hold_return = buy_hold_return(&ledger.actual_prices());
        let strategy_return = additive_return(&strategy);
        let momentum = momentum_returns(&actual);
        let momentum_return = additive_return(&momentum);
        Self {
            buy_hold_return,
            strategy_return,
            outperformance: strategy_return - buy_hold_return,
            win_rate: win_rate(&strategy),
            avg_win: avg_win(&strategy),
            avg_loss: avg_loss(&strategy),
            compounded_strategy_return: compounded_return(&strategy),
            compounded_buy_hold_return: compounded_return(&actual),
            sharpe: sharpe_ratio(&strategy, periods_per_year),
            buy_hold_sharpe: sharpe_ratio(&actual, periods_per_year),
            max_drawdown: max_drawdown_additive(&strategy),
            momentum_return,
            momentum_sharpe: sharpe_ratio(&momentum, periods_per_year),
            outperformance_vs_momentum: strategy_return - momentum_return,
        }
    }
}

/// Build the full result record for a run.
pub fn evaluate(
    ledger: &ForecastLedger,
    returns: &ReturnSeries,
    metadata: &RunMetadata,
) -> StrategyResult {
    let errors = ErrorMetrics::compute(ledger);
    let perf = ReturnMetrics::compute(ledger, returns, metadata.interval.periods_per_year());
    let period_start = ledger
        .first()
        .map(|r| r.date)
        .or(metadata.period_start)
        .unwrap_or_default();
    let period_end = ledger
        .last()
        .map(|r| r.date)
        .or(metadata.period_end)
        .unwrap_or_default();

    StrategyResult {
        schema_version: SCHEMA_VERSION,
        symbol: metadata.symbol.clone(),
        model: metadata.model.clone(),
        interval: metadata.interval,
        window: metadata.window,
        period_start,
        period_end,
        sample_count: ledger.len(),
        skipped_steps: metadata.skipped_steps(),
        return_points: returns.len(),
        mse: errors.mse,
        rmse: errors.rmse,
        mae: errors.mae,
        mape: errors.mape,
        mape_excluded_points: errors.mape_excluded_points,
        buy_hold_return: perf.buy_hold_return,
        strategy_return: perf.strategy_return,
        outperformance: perf.outperformance,
        win_rate: perf.win_rate,
        avg_win: perf.avg_win,
        avg_loss: perf.avg_loss,
        compounded_strategy_return: perf.compounded_strategy_return,
        compounded_buy_hold_return: perf.compounded_buy_hold_return,
        sharpe: perf.sharpe,
        buy_hold_sharpe: perf.buy_hold_sharpe,
        max_drawdown: perf.max_drawdown,
        momentum_return: perf.momentum_return,
        momentum_sharpe: perf.momentum_sharpe,
        outperformance_vs_momentum: perf.outperformance_vs_momentum,
    }
}

// ─── Forecast error functions ───────────────────────────────────────

pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    mean_f64(
        &actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| (a - p).powi(2))
            .collect::<Vec<_>>(),
    )
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    mean_f64(
        &actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| (a - p).abs())
            .collect::<Vec<_>>(),
    )
}

/// Mean absolute percentage error in percent, skipping zero actuals.
///
/// Returns `(mape, excluded_points)`.
pub fn mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> (f64, usize) {
    let mut excluded = 0;
    let terms: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .filter_map(|(a, p)| {
            if *a == 0.0 {
                excluded += 1;
                None
            } else {
                Some(((a - p) / a).abs())
            }
        })
        .collect();
    (mean_f64(&terms) * 100.0, excluded)
}

// ─── Return functions ───────────────────────────────────────────────

/// Point-to-point change from first to last price, in percent.
pub fn buy_hold_return(prices: &[f64]) -> f64 {
    match (prices.first(), prices.last()) {
        (Some(&first), Some(&last)) if prices.len() >= 2 && first != 0.0 => {
            (last - first) / first * 100.0
        }
        _ => 0.0,
    }
}

/// Sum of per-period returns, in percent.
pub fn additive_return(returns: &[f64]) -> f64 {
    returns.iter().sum::<f64>() * 100.0
}

/// Growth of one unit reinvested every period, in percent.
pub fn compounded_return(returns: &[f64]) -> f64 {
    (returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0) * 100.0
}

/// Per-period returns of the momentum benchmark: long after a rising
/// period, short otherwise. The first period has no prior return and is
/// held short.
pub fn momentum_returns(actual: &[f64]) -> Vec<f64> {
    let mut previous: Option<f64> = None;
    actual
        .iter()
        .map(|&r| {
            let direction = if previous.is_some_and(|p| p > 0.0) { 1.0 } else { -1.0 };
            previous = Some(r);
            direction * r
        })
        .collect()
}

/// Share of periods with a positive return, in percent.
pub fn win_rate(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().filter(|r| **r > 0.0).count() as f64 / returns.len() as f64 * 100.0
}

/// Mean of positive returns, 0 if there are none.
pub fn avg_win(returns: &[f64]) -> f64 {
    mean_f64(&returns.iter().copied().filter(|r| *r > 0.0).collect::<Vec<_>>())
}

/// Mean of negative returns, 0 if there are none.
pub fn avg_loss(returns: &[f64]) -> f64 {
    mean_f64(&returns.iter().copied().filter(|r| *r < 0.0).collect::<Vec<_>>())
}

/// Annualised mean/std of per-period returns. Zero when undefined.
pub fn sharpe_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let sd = std_dev(returns);
    if sd < 1e-12 {
        return 0.0;
    }
    mean_f64(returns) / sd * periods_per_year.sqrt()
}

/// Largest peak-to-trough fall of the additive cumulative return curve, in
/// percentage points (≤ 0). The curve starts at 0.
pub fn max_drawdown_additive(returns: &[f64]) -> f64 {
    let mut cumulative = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut worst = 0.0_f64;
    for r in returns {
        cumulative += r * 100.0;
        peak = peak.max(cumulative);
        worst = worst.min(cumulative - peak);
    }
    worst
}

// ─── Helpers ────────────────────────────────────────────────────────

pub fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1).
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

pub fn median_f64(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
