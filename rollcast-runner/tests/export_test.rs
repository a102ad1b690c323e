//! Artifact export: results table, summary JSON, Markdown report, run bundles.

use chrono::NaiveDate;
use rollcast_core::data::SyntheticSource;
use rollcast_core::model::ModelSpec;
use rollcast_runner::batch::{run_universe, BatchReport};
use rollcast_runner::config::BacktestConfig;
use rollcast_runner::export::{
    export_ledger_csv, load_run_result, save_batch_artifacts, save_run_artifacts,
};
use rollcast_runner::result::RESULT_COLUMNS;
use rollcast_runner::run_symbol;

fn config() -> BacktestConfig {
    let mut config = BacktestConfig::default();
    config.model = ModelSpec::Drift;
    config.backtest.window = 40;
    config.backtest.start_date = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
    config.backtest.end_date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
    config
}

fn batch() -> BatchReport {
    let names: Vec<String> = ["AAA", "BBB", "CCC"].iter().map(|s| s.to_string()).collect();
    run_universe(&SyntheticSource::new(1), &names, &config(), None, None).unwrap()
}

#[test]
fn batch_artifacts_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let report = batch();
    let csv_path = save_batch_artifacts(&report, dir.path()).unwrap();

    let name = csv_path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("rolling_backtest_results_"));
    assert!(name.ends_with(".csv"));
    // rolling_backtest_results_YYYYmmdd_HHMMSS.csv
    assert_eq!(name.len(), "rolling_backtest_results_".len() + 15 + 4);

    let mut reader = csv::Reader::from_path(&csv_path).unwrap();
    let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(header, RESULT_COLUMNS);
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(&rows[0][0], "AAA");
    assert_eq!(&rows[0][1], "DRIFT");

    let summary = std::fs::read_to_string(dir.path().join("summary.json")).unwrap();
    let back: BatchReport = serde_json::from_str(&summary).unwrap();
    assert_eq!(back.outcomes.len(), 3);
    assert_eq!(back.summary.completed, report.summary.completed);

    let md = std::fs::read_to_string(dir.path().join("report.md")).unwrap();
    assert!(md.contains("Model **DRIFT**, window 40 (weekly)."));
    assert!(md.contains("## Top performers"));
}

#[test]
fn run_artifacts_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_symbol(&SyntheticSource::new(1), "AAA", &config(), None).unwrap();

    let run_dir = save_run_artifacts(&run.result, &run.run.ledger, dir.path()).unwrap();
    assert!(run_dir.join("ledger.csv").exists());
    assert!(run_dir.join("result.csv").exists());

    let loaded = load_run_result(&run_dir).unwrap();
    assert_eq!(loaded.symbol, "AAA");
    assert_eq!(loaded.sample_count, run.result.sample_count);
    assert_eq!(loaded.period_end, run.result.period_end);
}

#[test]
fn ledger_csv_has_one_row_per_record() {
    let run = run_symbol(&SyntheticSource::new(1), "BBB", &config(), None).unwrap();
    let csv = export_ledger_csv(&run.run.ledger).unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines.len(), run.run.ledger.len() + 1);
    assert_eq!(
        lines[0],
        "step_index,date,actual_price,predicted_price,reference_price,signal"
    );
    let first = run.run.ledger.first().unwrap();
    assert!(lines[1].starts_with(&format!("{},{},", first.step_index, first.date)));
}
