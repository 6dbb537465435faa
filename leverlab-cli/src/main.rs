//! LeverLab CLI — parameter sweeps and single runs over candle CSV files.
//!
//! Commands:
//! - `sweep` — run every grid point of a TOML sweep config and save the
//!   passing rows, diagnostics, and report JSON
//! - `run` — run one settings index and write its order record log

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};

use leverlab_core::signals::examples::SmaCross;
use leverlab_core::signals::{PrecomputedSignals, Strategy};
use leverlab_runner::export::{export_records_csv, save_sweep, write};
use leverlab_runner::{
    load_candles, run_settings_index, synthetic_candles, BacktestScheduler, LoadedCandles,
    SingleRun, SweepConfig, SweepReport,
};

#[derive(Parser)]
#[command(
    name = "leverlab",
    about = "LeverLab CLI — leveraged backtests and parameter sweeps"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep every grid point of a config over one candle series.
    Sweep {
        #[command(flatten)]
        input: InputArgs,

        /// Worker threads (overrides the config; 0 = one per thread).
        #[arg(long)]
        workers: Option<usize>,

        /// Output directory for report.json and results.csv.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Number of top rows (by quality score) to print.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Run one settings index and write its order record log.
    Run {
        #[command(flatten)]
        input: InputArgs,

        /// Settings index to run.
        #[arg(long, default_value_t = 0)]
        index: usize,

        /// Where to write the order record CSV.
        #[arg(long, default_value = "results/records.csv")]
        records: PathBuf,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Path to a TOML sweep config.
    #[arg(long)]
    config: PathBuf,

    /// Candle CSV: open_time,open,high,low,close[,volume][,entry][,exit_price].
    #[arg(long)]
    candles: Option<PathBuf>,

    /// Generate this many synthetic one-minute candles instead of loading a file.
    #[arg(long)]
    synthetic: Option<usize>,

    /// Fast SMA periods for the SMA cross strategy (comma separated).
    #[arg(long, value_delimiter = ',')]
    fast: Vec<usize>,

    /// Slow SMA periods for the SMA cross strategy (comma separated).
    #[arg(long, value_delimiter = ',')]
    slow: Vec<usize>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Sweep {
            input,
            workers,
            output_dir,
            top,
        } => run_sweep_cmd(input, workers, &output_dir, top),
        Commands::Run {
            input,
            index,
            records,
        } => run_single_cmd(input, index, &records),
    }
}

fn run_sweep_cmd(
    input: InputArgs,
    workers: Option<usize>,
    output_dir: &Path,
    top: usize,
) -> Result<()> {
    let mut config = SweepConfig::load(&input.config)?;
    if let Some(workers) = workers {
        config.scheduler.workers = workers;
    }
    let data = load_input(&input)?;
    let strategy = build_strategy(&input, &config, &data)?;

    let scheduler = BacktestScheduler::new(config, strategy);
    let report = scheduler.run(&data.candles)?;

    print_sweep_summary(&report, top);
    let report_path = save_sweep(&report, output_dir)?;
    println!("Artifacts saved to: {}", output_dir.display());
    info!("report written to {}", report_path.display());
    Ok(())
}

fn run_single_cmd(input: InputArgs, index: usize, records_path: &Path) -> Result<()> {
    let config = SweepConfig::load(&input.config)?;
    let data = load_input(&input)?;
    let strategy = build_strategy(&input, &config, &data)?;

    let run = run_settings_index(&config, strategy.as_ref(), &data.candles, index)?;
    print_run_summary(&run);

    let csv = export_records_csv(run.report.records.records())?;
    write(records_path, &csv)?;
    println!("Order records saved to: {}", records_path.display());
    Ok(())
}

fn load_input(input: &InputArgs) -> Result<LoadedCandles> {
    let data = match (&input.candles, input.synthetic) {
        (Some(_), Some(_)) => bail!("--candles and --synthetic are mutually exclusive"),
        (None, None) => bail!("one of --candles or --synthetic is required"),
        (Some(path), None) => load_candles(path)
            .with_context(|| format!("failed to load candles from {}", path.display()))?,
        (None, Some(bars)) => {
            warn!("using {bars} synthetic candles; results are not meaningful");
            synthetic_candles("leverlab", bars, 60_000)
        }
    };
    info!(
        "loaded {} candles (dataset {})",
        data.candles.len(),
        &data.dataset_hash[..12]
    );
    Ok(data)
}

/// SMA cross when periods are given, otherwise the file's own signals.
fn build_strategy(
    input: &InputArgs,
    config: &SweepConfig,
    data: &LoadedCandles,
) -> Result<Box<dyn Strategy>> {
    match (input.fast.is_empty(), input.slow.is_empty()) {
        (false, false) => Ok(Box::new(SmaCross::new(
            config.static_order.long_or_short,
            input.fast.clone(),
            input.slow.clone(),
        ))),
        (true, true) => match &data.signals {
            Some(signals) => Ok(Box::new(PrecomputedSignals::new(signals.clone()))),
            None => bail!("candles carry no entry column; pass --fast and --slow"),
        },
        _ => bail!("--fast and --slow must be given together"),
    }
}

fn print_sweep_summary(report: &SweepReport, top: usize) {
    let d = &report.diagnostics;
    println!();
    println!("=== Sweep {} ===", &report.config_fingerprint[..12]);
    println!("Strategy:       {}", report.strategy);
    println!("Workers:        {}", report.workers);
    println!("Grid points:    {}", d.total_points);
    println!("Invalid:        {}", d.invalid_points);
    println!("Evaluated:      {}", d.evaluated);
    println!("Passed:         {}", d.passed);
    println!("Filtered out:   {}", d.filtered_out);
    println!("Failed:         {}", d.failed);
    println!("Elapsed:        {} ms", report.elapsed_ms);

    if !d.status_counts.is_empty() {
        println!();
        println!("Events:");
        for (status, n) in &d.status_counts {
            println!("  {status:?}: {n}");
        }
    }
    if d.rejections.total() > 0 {
        println!("Rejected entries:");
        for (reason, n) in d.rejections.iter() {
            println!("  {reason:?}: {n}");
        }
    }
    for failure in d.failures.iter().take(5) {
        println!("  failed #{}: {}", failure.settings_index, failure.message);
    }

    let ranked = report.ranked_by_qf();
    if !ranked.is_empty() {
        println!();
        println!(
            "{:>8} {:>7} {:>9} {:>8} {:>7}  params",
            "index", "trades", "gains %", "win %", "qf"
        );
        for row in ranked.into_iter().take(top) {
            let m = &row.metrics;
            println!(
                "{:>8} {:>7} {:>9.2} {:>8.2} {:>7.3}  {:?} rr={} risk={}",
                row.settings_index,
                m.total_trades,
                m.gains_pct,
                m.win_rate,
                m.qf_score,
                row.indicator_params,
                row.dynamic.risk_reward,
                row.dynamic.account_pct_risk_per_trade
            );
        }
    }
    println!();
}

fn print_run_summary(run: &SingleRun) {
    let m = &run.metrics;
    println!();
    println!("=== Settings index {} ===", run.point.settings_index);
    if !run.point.indicator_params.is_empty() {
        println!("Indicator params: {:?}", run.point.indicator_params);
    }
    println!("Trades:         {}", m.total_trades);
    println!("Wins / losses:  {} / {}", m.wins, m.losses);
    println!("Win rate:       {:.2}%", m.win_rate);
    println!("Gains:          {:.2}%", m.gains_pct);
    println!("Quality score:  {:.3}", m.qf_score);
    println!("Fees paid:      {:.2}", m.fees_paid);
    println!("Ending equity:  {:.2}", m.ending_equity);
    println!("Events logged:  {}", run.report.records.len());
    if run.report.open_at_end {
        println!("Position still open after the last bar.");
    }
    println!();
}
