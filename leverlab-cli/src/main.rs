//! LeverLab CLI: run, rebase, margin and annual commands.
//!
//! Commands:
//! - `run`: every strategy variant, the margin ledger and annual views
//! - `rebase`: value paths re-invested at the start of a sub-window
//! - `margin`: the margin-account ledger alone
//! - `annual`: year-level inflation and dividend views
//!
//! Logs go to stderr; set `RUST_LOG` to change the level (default `info`).

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use leverlab_runner::export::{export_annual_report_csv, export_margin_csv};
use leverlab_runner::{
    load_market_data, run_annual, run_lab_cached, run_margin, run_rebase, save_artifacts,
    JsonDirCache, LabConfig, LabReport, LoadOptions, MarketData, NoCache, PerformanceMetrics,
    ResultCache,
};

#[derive(Parser)]
#[command(
    name = "leverlab",
    about = "LeverLab CLI: leveraged index strategies under a moving-average regime"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the input series come from.
#[derive(Args)]
struct DataArgs {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Generate every series instead of reading CSV files.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Seed for synthetic data.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Synthetic start date (YYYY-MM-DD).
    #[arg(long, default_value = "1990-01-02")]
    synthetic_start: String,

    /// Synthetic end date (YYYY-MM-DD).
    #[arg(long, default_value = "2024-12-31")]
    synthetic_end: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every variant, the margin ledger and the annual views.
    Run {
        #[command(flatten)]
        data: DataArgs,

        /// Output directory for the report and CSV tables.
        #[arg(long, default_value = "results")]
        output: PathBuf,

        /// Reuse reports stored in this directory, keyed by run id.
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
    /// Re-invest the initial capital at --start and compound through --end.
    Rebase {
        #[command(flatten)]
        data: DataArgs,

        /// Window start (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// Window end (YYYY-MM-DD).
        #[arg(long)]
        end: String,
    },
    /// Simulate the margin account and print its final state.
    Margin {
        #[command(flatten)]
        data: DataArgs,

        /// Window start (YYYY-MM-DD). Requires --end.
        #[arg(long)]
        start: Option<String>,

        /// Window end (YYYY-MM-DD). Requires --start.
        #[arg(long)]
        end: Option<String>,

        /// Write the daily ledger to this CSV file.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Year-end nominal and inflation-adjusted values.
    Annual {
        #[command(flatten)]
        data: DataArgs,

        /// First year to print.
        #[arg(long)]
        from_year: Option<i32>,

        /// Last year to print.
        #[arg(long)]
        to_year: Option<i32>,

        /// Write the annual tables to this CSV file.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data,
            output,
            cache_dir,
        } => run_cmd(&data, &output, cache_dir.as_deref()),
        Commands::Rebase { data, start, end } => rebase_cmd(&data, &start, &end),
        Commands::Margin {
            data,
            start,
            end,
            csv,
        } => margin_cmd(&data, start.as_deref(), end.as_deref(), csv.as_deref()),
        Commands::Annual {
            data,
            from_year,
            to_year,
            csv,
        } => annual_cmd(&data, from_year, to_year, csv.as_deref()),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn load(args: &DataArgs) -> Result<(LabConfig, MarketData)> {
    let config = match &args.config {
        Some(path) => LabConfig::from_file(path)?,
        None => LabConfig::default(),
    };
    let opts = LoadOptions {
        synthetic: args.synthetic,
        seed: args.seed,
        start: parse_date(&args.synthetic_start)?,
        end: parse_date(&args.synthetic_end)?,
    };
    let data = load_market_data(&config.data, &opts)?;
    Ok((config, data))
}

fn run_cmd(args: &DataArgs, output: &Path, cache_dir: Option<&Path>) -> Result<()> {
    let (config, data) = load(args)?;

    let cache: Box<dyn ResultCache> = match cache_dir {
        Some(dir) => Box::new(JsonDirCache::new(dir)?),
        None => Box::new(NoCache),
    };
    let report = run_lab_cached(&config, &data, cache.as_ref())?;

    print_report(&report);

    let run_dir = save_artifacts(&report, output)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn rebase_cmd(args: &DataArgs, start: &str, end: &str) -> Result<()> {
    let (config, data) = load(args)?;
    let report = run_rebase(&config, &data, parse_date(start)?, parse_date(end)?)?;

    println!();
    println!("=== Rebased {} to {} ===", report.start, report.end);
    print_metrics_header();
    for v in &report.variants {
        print_metrics_row(&v.label, &v.metrics);
    }
    if let Some(margin) = &report.margin {
        print_metrics_row("margin", &margin.metrics);
    }
    print_skipped(report.skipped.iter().map(|s| (&s.view, &s.reason)));
    if data.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
    Ok(())
}

fn margin_cmd(
    args: &DataArgs,
    start: Option<&str>,
    end: Option<&str>,
    csv: Option<&Path>,
) -> Result<()> {
    let window = match (start, end) {
        (Some(s), Some(e)) => Some((parse_date(s)?, parse_date(e)?)),
        (None, None) => None,
        _ => bail!("--start and --end must be given together"),
    };
    let (config, data) = load(args)?;
    let report = run_margin(&config, &data, window)?;

    let Some(last) = report.ledger.last() else {
        bail!("margin ledger is empty");
    };
    println!();
    println!("=== Margin Account ===");
    println!(
        "Period:         {} to {}",
        report.ledger[0].date, last.date
    );
    println!("Base limit:     {:.2}", report.params.base_limit);
    println!("Spread:         {:.2}%", report.params.spread_pct);
    println!("Final limit:    {:.2}", last.margin_limit);
    println!("Cash:           {:.2}", last.cash);
    println!("Debt:           {:.2}", last.debt);
    println!("Invested:       {:.2}", last.invested);
    println!("Equity:         {:.2}", last.equity());
    println!("Max Drawdown:   {:.2}%", report.metrics.max_drawdown * 100.0);
    println!(
        "Days in market: {} of {}",
        report.metrics.days_in_market, report.metrics.trading_days
    );
    if report.underfunded_entries > 0 {
        println!("WARNING: {} underfunded entries", report.underfunded_entries);
    }
    println!();

    if let Some(path) = csv {
        std::fs::write(path, export_margin_csv(&report.ledger)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Ledger saved to: {}", path.display());
    }
    Ok(())
}

fn annual_cmd(
    args: &DataArgs,
    from_year: Option<i32>,
    to_year: Option<i32>,
    csv: Option<&Path>,
) -> Result<()> {
    let (config, data) = load(args)?;
    let report = run_annual(&config, &data)?;
    let in_range =
        |y: i32| from_year.map_or(true, |f| y >= f) && to_year.map_or(true, |t| y <= t);

    println!();
    println!("=== Inflation-adjusted year-end values ===");
    if let Some(c) = report.cpi_cagr {
        println!("CPI CAGR:       {:.2}%", c * 100.0);
    }
    for series in report.real.iter().chain(&report.dividend_reinvested) {
        println!();
        println!("{}", series.label);
        println!("{:<6} {:>14} {:>14}", "Year", "Nominal", "Real");
        for p in series.points.iter().filter(|p| in_range(p.year)) {
            println!("{:<6} {:>14.2} {:>14.2}", p.year, p.nominal, p.real);
        }
    }
    if let Some(index) = &report.rotation_index {
        if let Some(c) = index.cagr {
            println!();
            println!("Rotation index CAGR: {:.2}%", c * 100.0);
        }
    }
    print_skipped(report.skipped.iter().map(|s| (&s.view, &s.reason)));
    println!();

    if let Some(path) = csv {
        std::fs::write(path, export_annual_report_csv(&report)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Annual tables saved to: {}", path.display());
    }
    Ok(())
}

fn print_metrics_header() {
    println!(
        "{:<32} {:>12} {:>9} {:>8} {:>9} {:>8}",
        "Variant", "Final", "CAGR", "Sharpe", "MaxDD", "InMkt%"
    );
    println!("{}", "-".repeat(83));
}

fn print_metrics_row(label: &str, m: &PerformanceMetrics) {
    let in_market = if m.trading_days > 0 {
        m.days_in_market as f64 / m.trading_days as f64 * 100.0
    } else {
        0.0
    };
    println!(
        "{:<32} {:>12.2} {:>8.2}% {:>8.3} {:>8.2}% {:>7.1}%",
        label,
        m.final_value,
        m.cagr * 100.0,
        m.sharpe,
        m.max_drawdown * 100.0,
        in_market
    );
}

fn print_skipped<'a>(skipped: impl Iterator<Item = (&'a String, &'a String)>) {
    for (view, reason) in skipped {
        println!("SKIPPED {view}: {reason}");
    }
}

fn print_report(report: &LabReport) {
    println!();
    println!("=== Lab Result ===");
    if let (Some(start), Some(end)) = (report.start_date, report.end_date) {
        println!("Period:         {start} to {end}");
    }
    println!("Run id:         {}", report.run_id);
    println!(
        "Trading days:   {} ({} days risk-on)",
        report.regime.len(),
        report.regime.iter().filter(|d| d.regime_on).count()
    );
    println!();
    print_metrics_header();
    for v in &report.variants {
        print_metrics_row(&v.label, &v.metrics);
    }
    if let Some(margin) = &report.margin {
        print_metrics_row("margin", &margin.metrics);
        if margin.underfunded_entries > 0 {
            println!("WARNING: {} underfunded margin entries", margin.underfunded_entries);
        }
    }
    print_skipped(report.skipped.iter().map(|s| (&s.view, &s.reason)));
    if report.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
}
