//! Reporting and export — CSV, JSON and Markdown artifact generation.
//!
//! Provides:
//! - **CSV**: the results table (one row per completed symbol, columns in
//!   [`RESULT_COLUMNS`] order) and the per-step forecast ledger
//! - **JSON**: single results and the batch report, with schema versioning
//! - **Markdown**: a human-readable batch report
//!
//! Unknown schema versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rollcast_core::domain::ForecastLedger;

use crate::batch::{BatchReport, SymbolOutcome};
use crate::result::{StrategyResult, RESULT_COLUMNS, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_result_json(result: &StrategyResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize StrategyResult to JSON")
}

/// Deserialize a `StrategyResult`, rejecting unknown schema versions.
pub fn import_result_json(json: &str) -> Result<StrategyResult> {
    let result: StrategyResult =
        serde_json::from_str(json).context("failed to deserialize StrategyResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

pub fn export_report_json(report: &BatchReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize BatchReport to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Results table with a header row.
pub fn export_results_csv<'a>(results: impl IntoIterator<Item = &'a StrategyResult>) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(RESULT_COLUMNS)?;
    for r in results {
        wtr.write_record(r.to_row())?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Per-step forecast ledger.
pub fn export_ledger_csv(ledger: &ForecastLedger) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "step_index",
        "date",
        "actual_price",
        "predicted_price",
        "reference_price",
        "signal",
    ])?;
    for r in ledger {
        wtr.write_record([
            &r.step_index.to_string(),
            &r.date.to_string(),
            &format!("{:.6}", r.actual_price),
            &format!("{:.6}", r.predicted_price),
            &format!("{:.6}", r.reference_price),
            &r.signal.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// File name of the timestamped results table.
pub fn results_file_name(timestamp: &str) -> String {
    format!("rolling_backtest_results_{timestamp}.csv")
}

/// Save the artifact set for a batch.
///
/// Writes into `output_dir` (created if missing):
/// - `rolling_backtest_results_{YYYYmmdd_HHMMSS}.csv`: results table
/// - `summary.json`: the full `BatchReport`
/// - `report.md`: Markdown summary
///
/// Returns the path of the results table.
pub fn save_batch_artifacts(report: &BatchReport, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let csv_path = output_dir.join(results_file_name(&timestamp));
    std::fs::write(&csv_path, export_results_csv(report.results())?)
        .with_context(|| format!("failed to write {}", csv_path.display()))?;

    std::fs::write(output_dir.join("summary.json"), export_report_json(report)?)
        .context("failed to write summary.json")?;
    std::fs::write(output_dir.join("report.md"), generate_batch_report(report))
        .context("failed to write report.md")?;

    Ok(csv_path)
}

/// Save the artifact set for a single symbol run into `{output_dir}/{symbol}_{timestamp}/`.
///
/// Contains `result.json`, `ledger.csv` and `result.csv`. Returns the directory.
pub fn save_run_artifacts(
    result: &StrategyResult,
    ledger: &ForecastLedger,
    output_dir: &Path,
) -> Result<PathBuf> {
    let dirname = format!(
        "{}_{}",
        result.symbol,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("result.json"), export_result_json(result)?)?;
    std::fs::write(run_dir.join("ledger.csv"), export_ledger_csv(ledger)?)?;
    std::fs::write(run_dir.join("result.csv"), export_results_csv([result])?)?;

    Ok(run_dir)
}

/// Load a `StrategyResult` from an artifact directory's result.json.
pub fn load_run_result(dir: &Path) -> Result<StrategyResult> {
    let path = dir.join("result.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_result_json(&json)
}

// ─── Markdown reports ───────────────────────────────────────────────

/// Markdown summary of a batch.
pub fn generate_batch_report(report: &BatchReport) -> String {
    let s = &report.summary;
    let mut md = String::with_capacity(4096);

    md.push_str("# Rolling Backtest Report\n\n");
    if let Some(first) = report.results().next() {
        md.push_str(&format!(
            "Model **{}**, window {} ({}).\n\n",
            first.model, first.window, first.interval
        ));
    }

    md.push_str("## Batch\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Symbols | {} |\n", s.attempted));
    md.push_str(&format!("| Completed | {} |\n", s.completed));
    md.push_str(&format!("| No result | {} |\n", s.degenerate));
    md.push_str(&format!("| Failed | {} |\n", s.failed));
    if s.cancelled > 0 || report.cancelled {
        md.push_str(&format!("| Cancelled | {} |\n", s.cancelled));
    }
    md.push_str(&format!("| Success rate | {:.1}% |\n", s.success_rate));
    md.push_str(&format!("| Beat buy & hold | {:.1}% |\n", s.beat_buy_hold_pct));
    md.push_str(&format!("| Ranked by | {} |\n", s.ranked_by));
    md.push('\n');

    md.push_str("## Aggregates\n\n");
    md.push_str("| Metric | Mean | Median |\n");
    md.push_str("| --- | --- | --- |\n");
    for (name, agg) in [
        ("Strategy return (%)", &s.strategy_return),
        ("Buy & hold return (%)", &s.buy_hold_return),
        ("Outperformance (%)", &s.outperformance),
        ("Win rate (%)", &s.win_rate),
        ("RMSE", &s.rmse),
        ("MAPE (%)", &s.mape),
        ("Momentum return (%)", &s.momentum_return),
        ("Strategy vs momentum (%)", &s.outperformance_vs_momentum),
    ] {
        md.push_str(&format!("| {name} | {:.2} | {:.2} |\n", agg.mean, agg.median));
    }
    md.push('\n');

    for (title, entries) in [("Top performers", &s.top), ("Bottom performers", &s.bottom)] {
        if entries.is_empty() {
            continue;
        }
        md.push_str(&format!("## {title}\n\n"));
        md.push_str(&format!(
            "| Rank | Symbol | {} | Strategy (%) | Buy & hold (%) | Outperformance (%) | Win rate (%) |\n",
            s.ranked_by
        ));
        md.push_str("| --- | --- | --- | --- | --- | --- | --- |\n");
        for e in entries.iter() {
            md.push_str(&format!(
                "| {} | {} | {:.2} | {:.2} | {:.2} | {:.2} | {:.1} |\n",
                e.rank,
                e.symbol,
                e.score,
                e.strategy_return,
                e.buy_hold_return,
                e.outperformance,
                e.win_rate
            ));
        }
        md.push('\n');
    }

    let problems: Vec<&SymbolOutcome> = report
        .outcomes
        .iter()
        .filter(|o| o.result().is_none())
        .collect();
    if !problems.is_empty() {
        md.push_str("## Not evaluated\n\n");
        for o in problems {
            let detail = match o {
                SymbolOutcome::NoResult { reason, .. } => reason.as_str(),
                SymbolOutcome::Failed { error, .. } => error.as_str(),
                SymbolOutcome::Cancelled { .. } => "cancelled",
                SymbolOutcome::Completed(_) => continue,
            };
            md.push_str(&format!("- **{}**: {detail}\n", o.symbol()));
        }
        md.push('\n');
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaderboard::{BatchSummary, RankingMetric};
    use crate::result::tests::sample;

    fn report() -> BatchReport {
        report_ranked_by(RankingMetric::StrategyReturn)
    }

    fn report_ranked_by(metric: RankingMetric) -> BatchReport {
        let outcomes = vec![
            SymbolOutcome::Completed(sample("AAA", 6.0, 3.0)),
            SymbolOutcome::Failed {
                symbol: "BBB".into(),
                error: "data unavailable".into(),
            },
            SymbolOutcome::Completed(sample("CCC", -2.0, 4.0)),
        ];
        BatchReport {
            summary: BatchSummary::from_outcomes(&outcomes, 5, metric),
            outcomes,
            cancelled: false,
            elapsed_ms: 12,
        }
    }

    #[test]
    fn results_csv_has_header_and_rows() {
        let r = report();
        let csv = export_results_csv(r.results()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], RESULT_COLUMNS.join(","));
        assert!(lines[1].starts_with("AAA,ARIMA(2,1,2),weekly,100,"));
        assert!(lines[2].starts_with("CCC,"));
    }

    #[test]
    fn json_import_rejects_future_schema() {
        let mut r = sample("AAA", 1.0, 1.0);
        let json = export_result_json(&r).unwrap();
        assert_eq!(import_result_json(&json).unwrap(), r);

        r.schema_version = SCHEMA_VERSION + 1;
        let json = export_result_json(&r).unwrap();
        assert!(import_result_json(&json).is_err());
    }

    #[test]
    fn markdown_lists_rankings_and_failures() {
        let md = generate_batch_report(&report());
        assert!(md.contains("# Rolling Backtest Report"));
        assert!(md.contains("| Completed | 2 |"));
        assert!(md.contains("## Top performers"));
        assert!(md.contains("| 1 | AAA |"));
        assert!(md.contains("- **BBB**: data unavailable"));
        assert!(md.contains("| Ranked by | strategy_return |"));
        // Momentum 2.5 for both; AAA 6.0 and CCC -2.0 give a mean excess of -0.5.
        assert!(md.contains("| Momentum return (%) | 2.50 | 2.50 |"));
        assert!(md.contains("| Strategy vs momentum (%) | -0.50 | -0.50 |"));
    }

    #[test]
    fn markdown_orders_by_configured_metric() {
        // Outperformance: AAA +3, CCC -6.
        let md = generate_batch_report(&report_ranked_by(RankingMetric::Outperformance));
        assert!(md.contains("| Ranked by | outperformance |"));
        assert!(md.contains("| Rank | Symbol | outperformance |"));
        assert!(md.contains("| 1 | AAA | 3.00 |"));
        assert!(md.contains("| 2 | CCC | -6.00 |"));
    }
}
