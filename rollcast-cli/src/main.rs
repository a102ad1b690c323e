//! Rollcast CLI — rolling-window forecast backtests from the command line.
//!
//! Commands:
//! - `run`: backtest one symbol and save its result, ledger and summary
//! - `batch`: backtest a symbol universe and save the results table,
//!   `summary.json` and `report.md`
//! - `universe`: show the lists in a universe file
//!
//! Prices come from a directory of `{SYMBOL}.csv` files, or from the
//! synthetic generator with `--synthetic`.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rollcast_core::data::{CsvDirectorySource, PriceSource, SyntheticSource, Universe};
use rollcast_core::domain::Interval;
use rollcast_core::model::ModelSpec;
use rollcast_runner::batch::{run_universe, BatchProgress, BatchReport};
use rollcast_runner::export::{save_batch_artifacts, save_run_artifacts};
use rollcast_runner::runner::run_symbol;
use rollcast_runner::{BacktestConfig, RankingMetric, StrategyResult};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "rollcast",
    about = "Rollcast: rolling-window forecast backtester"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest a single symbol.
    Run {
        /// Symbol to backtest (file `{SYMBOL}.csv` in the data directory).
        #[arg(long)]
        symbol: String,

        #[command(flatten)]
        settings: Settings,

        #[command(flatten)]
        data: DataArgs,

        /// Output directory for the run's artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Backtest every symbol in a universe or an explicit symbol list.
    Batch {
        /// Symbols to run (e.g., TCS INFY HDFCBANK).
        symbols: Vec<String>,

        /// Universe TOML file; all its lists are used unless --list is given.
        #[arg(long)]
        universe: Option<PathBuf>,

        /// Named list inside the universe file.
        #[arg(long, requires = "universe")]
        list: Option<String>,

        /// Worker threads (0 = one per core).
        #[arg(long)]
        threads: Option<usize>,

        /// Ranking metric: strategy_return, outperformance, sharpe, win_rate or rmse.
        #[arg(long)]
        rank_by: Option<RankingMetric>,

        #[command(flatten)]
        settings: Settings,

        #[command(flatten)]
        data: DataArgs,

        /// Output directory for the batch artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Show the lists in a universe file.
    Universe {
        /// Universe TOML file.
        file: PathBuf,

        /// Print the symbols of this list only.
        #[arg(long)]
        list: Option<String>,
    },
}

/// Config file plus command-line overrides.
#[derive(Args)]
struct Settings {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Trailing window length in observations.
    #[arg(long)]
    window: Option<usize>,

    /// Model: `naive`, `drift`, `mean`, `p,d,q` or `arima(p,d,q)`.
    #[arg(long)]
    model: Option<ModelSpec>,

    /// Interval: daily, weekly or monthly.
    #[arg(long)]
    interval: Option<Interval>,

    /// Start date (YYYY-MM-DD).
    #[arg(long)]
    start: Option<NaiveDate>,

    /// End date (YYYY-MM-DD).
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Forecast only the last (1 - ratio) share of the series.
    #[arg(long)]
    train_ratio: Option<f64>,
}

#[derive(Args)]
struct DataArgs {
    /// Directory of `{SYMBOL}.csv` price files.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Use generated prices instead of files.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Seed for synthetic prices.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "rollcast=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            symbol,
            settings,
            data,
            output_dir,
        } => run_single_cmd(&symbol, &settings, &data, &output_dir),
        Commands::Batch {
            symbols,
            universe,
            list,
            threads,
            rank_by,
            settings,
            data,
            output_dir,
        } => run_batch_cmd(
            symbols,
            universe.as_deref(),
            list.as_deref(),
            BatchOverrides { threads, rank_by },
            &settings,
            &data,
            &output_dir,
        ),
        Commands::Universe { file, list } => run_universe_cmd(&file, list.as_deref()),
    }
}

fn build_config(settings: &Settings) -> Result<BacktestConfig> {
    let mut config = match &settings.config {
        Some(path) => BacktestConfig::from_file(path)?,
        None => BacktestConfig::default(),
    };

    if let Some(window) = settings.window {
        config.backtest.window = window;
    }
    if let Some(model) = &settings.model {
        config.model = *model;
    }
    if let Some(interval) = settings.interval {
        config.backtest.interval = interval;
    }
    if let Some(start) = settings.start {
        config.backtest.start_date = start;
    }
    if let Some(end) = settings.end {
        config.backtest.end_date = end;
    }
    if settings.train_ratio.is_some() {
        config.backtest.train_ratio = settings.train_ratio;
    }

    config.validate().context("invalid backtest settings")?;
    Ok(config)
}

fn open_source(data: &DataArgs) -> Result<Box<dyn PriceSource>> {
    if data.synthetic {
        return Ok(Box::new(SyntheticSource::new(data.seed)));
    }
    if !data.data_dir.is_dir() {
        bail!(
            "data directory does not exist: {} (use --synthetic for generated prices)",
            data.data_dir.display()
        );
    }
    Ok(Box::new(CsvDirectorySource::new(&data.data_dir)))
}

fn run_single_cmd(
    symbol: &str,
    settings: &Settings,
    data: &DataArgs,
    output_dir: &Path,
) -> Result<()> {
    let config = build_config(settings)?;
    let source = open_source(data)?;

    let run = run_symbol(source.as_ref(), symbol, &config, None)
        .with_context(|| format!("backtest failed for {symbol}"))?;

    print_result(&run.result);
    if data.synthetic {
        println!("WARNING: Results based on SYNTHETIC data");
        println!();
    }

    let run_dir = save_run_artifacts(&run.result, &run.run.ledger, output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

/// Batch-only flags layered over the `[batch]` config section.
struct BatchOverrides {
    threads: Option<usize>,
    rank_by: Option<RankingMetric>,
}

impl BatchOverrides {
    fn apply(&self, config: &mut BacktestConfig) {
        if let Some(threads) = self.threads {
            config.batch.threads = threads;
        }
        if let Some(metric) = self.rank_by {
            config.batch.rank_by = metric;
        }
    }
}

fn run_batch_cmd(
    mut symbols: Vec<String>,
    universe: Option<&Path>,
    list: Option<&str>,
    overrides: BatchOverrides,
    settings: &Settings,
    data: &DataArgs,
    output_dir: &Path,
) -> Result<()> {
    let mut config = build_config(settings)?;
    overrides.apply(&mut config);

    if let Some(path) = universe {
        let universe = Universe::from_file(path)?;
        match list {
            Some(name) => symbols.extend(universe.list(name)?.iter().cloned()),
            None => symbols.extend(universe.all_symbols()),
        }
    }
    let mut seen = std::collections::HashSet::new();
    symbols.retain(|s| seen.insert(s.clone()));
    if symbols.is_empty() {
        bail!("no symbols given: pass symbols or --universe");
    }

    let source = open_source(data)?;
    let progress = |p: &BatchProgress| {
        eprintln!("[{}/{}] {} ({} completed)", p.finished, p.total, p.symbol, p.completed);
    };
    let report = run_universe(source.as_ref(), &symbols, &config, Some(&progress), None)?;

    print_batch(&report);
    if data.synthetic {
        println!("WARNING: Results based on SYNTHETIC data");
        println!();
    }

    let csv_path = save_batch_artifacts(&report, output_dir)?;
    println!("Results saved to: {}", csv_path.display());
    Ok(())
}

fn run_universe_cmd(file: &Path, list: Option<&str>) -> Result<()> {
    let universe = Universe::from_file(file)?;

    if let Some(name) = list {
        for symbol in universe.list(name)? {
            println!("{symbol}");
        }
        return Ok(());
    }

    println!("Universe: {}", file.display());
    println!("{:<20} {:>8}", "List", "Symbols");
    println!("{}", "-".repeat(29));
    for name in universe.list_names() {
        println!("{:<20} {:>8}", name, universe.list(name)?.len());
    }
    println!("{}", "-".repeat(29));
    println!("{:<20} {:>8}", "unique", universe.symbol_count());
    Ok(())
}

fn print_result(result: &StrategyResult) {
    println!();
    println!("=== Rolling Backtest Result ===");
    println!("Symbol:         {}", result.symbol);
    println!("Model:          {} (window {})", result.model, result.window);
    println!(
        "Period:         {} to {} ({})",
        result.period_start, result.period_end, result.interval
    );
    println!(
        "Forecasts:      {} ({} skipped)",
        result.sample_count, result.skipped_steps
    );
    println!();
    println!("--- Forecast Error ---");
    println!("MSE:            {:.4}", result.mse);
    println!("RMSE:           {:.4}", result.rmse);
    println!("MAE:            {:.4}", result.mae);
    println!("MAPE:           {:.2}%", result.mape);
    println!();
    println!("--- Strategy vs Buy & Hold ---");
    println!("Buy & Hold:     {:.2}%", result.buy_hold_return);
    println!("Strategy:       {:.2}%", result.strategy_return);
    println!("Outperformance: {:.2}%", result.outperformance);
    println!("Win Rate:       {:.1}%", result.win_rate);
    println!("Avg Win:        {:.2}%", result.avg_win * 100.0);
    println!("Avg Loss:       {:.2}%", result.avg_loss * 100.0);
    println!("Sharpe:         {:.3}", result.sharpe);
    println!("Max Drawdown:   {:.2}%", result.max_drawdown);
    println!();
    println!("--- Strategy vs Momentum ---");
    println!("Momentum:       {:.2}%", result.momentum_return);
    println!("Mom. Sharpe:    {:.3}", result.momentum_sharpe);
    println!("Vs Momentum:    {:.2}%", result.outperformance_vs_momentum);
    println!();
}

fn print_batch(report: &BatchReport) {
    let s = &report.summary;
    println!();
    println!("=== Batch Summary ===");
    println!(
        "Symbols:        {} ({} completed, {} no result, {} failed)",
        s.attempted, s.completed, s.degenerate, s.failed
    );
    println!("Success Rate:   {:.1}%", s.success_rate);
    println!("Beat Buy&Hold:  {:.1}%", s.beat_buy_hold_pct);
    println!("Ranked By:      {}", s.ranked_by);
    println!(
        "Avg Strategy:   {:.2}% (median {:.2}%)",
        s.strategy_return.mean, s.strategy_return.median
    );
    println!(
        "Avg Buy&Hold:   {:.2}% (median {:.2}%)",
        s.buy_hold_return.mean, s.buy_hold_return.median
    );
    println!(
        "Avg Momentum:   {:.2}% (median {:.2}%)",
        s.momentum_return.mean, s.momentum_return.median
    );
    println!("Elapsed:        {:.1}s", report.elapsed_ms as f64 / 1000.0);

    for (title, entries) in [("Top", &s.top), ("Bottom", &s.bottom)] {
        if entries.is_empty() {
            continue;
        }
        println!();
        println!("--- {title} {} ---", entries.len());
        println!(
            "{:<5} {:<12} {:>16} {:>10} {:>10} {:>10}",
            "Rank",
            "Symbol",
            s.ranked_by.key(),
            "Strategy",
            "Buy&Hold",
            "Excess"
        );
        for e in entries.iter() {
            println!(
                "{:<5} {:<12} {:>16.3} {:>9.2}% {:>9.2}% {:>9.2}%",
                e.rank, e.symbol, e.score, e.strategy_return, e.buy_hold_return, e.outperformance
            );
        }
    }

    for outcome in &report.outcomes {
        if outcome.result().is_none() {
            println!("WARNING: {} was not evaluated", outcome.symbol());
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_overrides(args: &[&str]) -> BatchOverrides {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Batch { threads, rank_by, .. } => BatchOverrides { threads, rank_by },
            _ => panic!("expected batch command"),
        }
    }

    #[test]
    fn rank_by_flag_overrides_config() {
        let overrides = batch_overrides(&["rollcast", "batch", "AAA", "--rank-by", "rmse"]);
        let mut config = BacktestConfig::default();
        overrides.apply(&mut config);
        assert_eq!(config.batch.rank_by, RankingMetric::Rmse);

        let overrides = batch_overrides(&["rollcast", "batch", "AAA", "--threads", "2"]);
        let mut config = BacktestConfig::default();
        config.batch.rank_by = RankingMetric::Sharpe;
        overrides.apply(&mut config);
        assert_eq!(config.batch.rank_by, RankingMetric::Sharpe);
        assert_eq!(config.batch.threads, 2);
    }

    #[test]
    fn unknown_rank_by_is_a_usage_error() {
        assert!(Cli::try_parse_from(["rollcast", "batch", "AAA", "--rank-by", "sortino"]).is_err());
    }
}
