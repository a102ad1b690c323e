//! Batch summary — counts, aggregates and top/bottom rankings.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::batch::SymbolOutcome;
use crate::metrics::{mean_f64, median_f64};
use crate::result::StrategyResult;

/// Metric used to order results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RankingMetric {
    #[default]
    StrategyReturn,
    Outperformance,
    Sharpe,
    WinRate,
    /// Lower is better.
    Rmse,
}

impl RankingMetric {
    pub const ALL: [RankingMetric; 5] = [
        RankingMetric::StrategyReturn,
        RankingMetric::Outperformance,
        RankingMetric::Sharpe,
        RankingMetric::WinRate,
        RankingMetric::Rmse,
    ];

    pub fn value(self, result: &StrategyResult) -> f64 {
        match self {
            RankingMetric::StrategyReturn => result.strategy_return,
            RankingMetric::Outperformance => result.outperformance,
            RankingMetric::Sharpe => result.sharpe,
            RankingMetric::WinRate => result.win_rate,
            RankingMetric::Rmse => result.rmse,
        }
    }

    /// Config and command-line name.
    pub fn key(self) -> &'static str {
        match self {
            RankingMetric::StrategyReturn => "strategy_return",
            RankingMetric::Outperformance => "outperformance",
            RankingMetric::Sharpe => "sharpe",
            RankingMetric::WinRate => "win_rate",
            RankingMetric::Rmse => "rmse",
        }
    }

    fn higher_is_better(self) -> bool {
        !matches!(self, RankingMetric::Rmse)
    }
}

impl std::fmt::Display for RankingMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for RankingMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        RankingMetric::ALL
            .into_iter()
            .find(|m| m.key() == key)
            .ok_or_else(|| {
                let valid: Vec<&str> = RankingMetric::ALL.iter().map(|m| m.key()).collect();
                format!("unknown ranking metric '{s}'. Valid: {}", valid.join(", "))
            })
    }
}

/// Best-first ordering. NaN values sink to the end; ties keep input order.
pub fn rank<'a>(results: &[&'a StrategyResult], metric: RankingMetric) -> Vec<&'a StrategyResult> {
    let mut ranked = results.to_vec();
    ranked.sort_by(|a, b| {
        let (va, vb) = (metric.value(a), metric.value(b));
        match (va.is_nan(), vb.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) if metric.higher_is_better() => vb.total_cmp(&va),
            (false, false) => va.total_cmp(&vb),
        }
    });
    ranked
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub rank: usize,
    pub symbol: String,
    /// Value of the ranking metric.
    #[serde(default)]
    pub score: f64,
    pub strategy_return: f64,
    pub buy_hold_return: f64,
    pub outperformance: f64,
    pub win_rate: f64,
    pub rmse: f64,
}

impl RankedEntry {
    fn from_result(rank: usize, r: &StrategyResult, metric: RankingMetric) -> Self {
        Self {
            rank,
            symbol: r.symbol.clone(),
            score: metric.value(r),
            strategy_return: r.strategy_return,
            buy_hold_return: r.buy_hold_return,
            outperformance: r.outperformance,
            win_rate: r.win_rate,
            rmse: r.rmse,
        }
    }
}

/// Mean and median of one metric across completed symbols.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub mean: f64,
    pub median: f64,
}

impl Aggregate {
    fn of(values: &[f64]) -> Self {
        Self {
            mean: mean_f64(values),
            median: median_f64(values),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub attempted: usize,
    pub completed: usize,
    /// Ran, but with fewer than two usable records.
    pub degenerate: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Completed / attempted, in percent.
    pub success_rate: f64,
    /// Metric behind `top` and `bottom`.
    #[serde(default)]
    pub ranked_by: RankingMetric,
    pub top: Vec<RankedEntry>,
    pub bottom: Vec<RankedEntry>,
    pub strategy_return: Aggregate,
    pub buy_hold_return: Aggregate,
    pub outperformance: Aggregate,
    pub win_rate: Aggregate,
    pub rmse: Aggregate,
    pub mape: Aggregate,
    #[serde(default)]
    pub momentum_return: Aggregate,
    #[serde(default)]
    pub outperformance_vs_momentum: Aggregate,
    /// Share of completed symbols whose strategy beat buy-and-hold, in percent.
    pub beat_buy_hold_pct: f64,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[SymbolOutcome], top_n: usize, ranked_by: RankingMetric) -> Self {
        let results: Vec<&StrategyResult> = outcomes.iter().filter_map(|o| o.result()).collect();
        let count = |pred: fn(&SymbolOutcome) -> bool| outcomes.iter().filter(|o| pred(o)).count();

        let attempted = outcomes.len();
        let completed = results.len();
        let metric = |f: fn(&StrategyResult) -> f64| results.iter().map(|r| f(r)).collect::<Vec<_>>();

        let ranked = rank(&results, ranked_by);
        let top = ranked
            .iter()
            .take(top_n)
            .enumerate()
            .map(|(i, r)| RankedEntry::from_result(i + 1, r, ranked_by))
            .collect();
        let bottom = ranked
            .iter()
            .rev()
            .take(top_n)
            .enumerate()
            .map(|(i, r)| RankedEntry::from_result(completed - i, r, ranked_by))
            .collect();

        Self {
            attempted,
            completed,
            degenerate: count(|o| matches!(o, SymbolOutcome::NoResult { .. })),
            failed: count(|o| matches!(o, SymbolOutcome::Failed { .. })),
            cancelled: count(|o| matches!(o, SymbolOutcome::Cancelled { .. })),
            success_rate: if attempted == 0 {
                0.0
            } else {
                completed as f64 / attempted as f64 * 100.0
            },
            ranked_by,
            top,
            bottom,
            strategy_return: Aggregate::of(&metric(|r| r.strategy_return)),
            buy_hold_return: Aggregate::of(&metric(|r| r.buy_hold_return)),
            outperformance: Aggregate::of(&metric(|r| r.outperformance)),
            win_rate: Aggregate::of(&metric(|r| r.win_rate)),
            rmse: Aggregate::of(&metric(|r| r.rmse)),
            mape: Aggregate::of(&metric(|r| r.mape)),
            momentum_return: Aggregate::of(&metric(|r| r.momentum_return)),
            outperformance_vs_momentum: Aggregate::of(&metric(|r| r.outperformance_vs_momentum)),
            beat_buy_hold_pct: if completed == 0 {
                0.0
            } else {
                results.iter().filter(|r| r.beat_buy_hold()).count() as f64 / completed as f64
                    * 100.0
            },
        }
    }
}
