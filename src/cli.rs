//! CLI definition and dispatch.

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use crate::adapters::csv_adapter::read_series;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::github_adapter::{GitHubAdapter, GitHubConfig, DEFAULT_API_URL, TOKEN_ENV};
use crate::adapters::yahoo_adapter::{YahooAdapter, DEFAULT_BASE_URL};
use crate::domain::config_validation::{
    optional_u32, parse_date, required_date, required_enum, required_f64, required_string,
    validate_publish_config, validate_simulation_config, DATA, PUBLISH, SIMULATION,
};
use crate::domain::error::DipLadderError;
use crate::domain::ladder::{RunMode, SimulationConfig};
use crate::domain::normalizer::{NormalizedSeries, DATE_FORMAT};
use crate::domain::simulator::{self, BuyCheck, Decision, SimulationResult};
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;
use crate::publish::{run_publish_pipeline, SymbolReport, SymbolStatus};

#[derive(Parser, Debug)]
#[command(name = "dipladder", about = "Dip-ladder DCA simulator and price data pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a price file through the dip ladder
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
        /// Price file; overrides [data] path
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Only analyse the first N days of history
        #[arg(long)]
        window_days: Option<u32>,
        /// Execute every affordable trigger instead of validating labels
        #[arg(long)]
        live: bool,
        /// Write the per-record decision log as CSV
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Validate a configuration file
    Check {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show date range and skipped rows of a price file
    Info {
        #[arg(short, long)]
        data: PathBuf,
    },
    /// Fetch daily prices and publish them as CSV files
    Publish {
        #[arg(short, long)]
        config: PathBuf,
        /// End of the fetch range (YYYY-MM-DD, exclusive); defaults to today
        #[arg(long)]
        end: Option<String>,
    },
}

/// Command-line overrides for a simulation run.
#[derive(Debug, Clone, Default)]
pub struct SimulateOptions {
    pub data: Option<PathBuf>,
    pub window_days: Option<u32>,
    pub live: bool,
    pub log: Option<PathBuf>,
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Simulate {
            config,
            data,
            window_days,
            live,
            log,
        } => {
            let options = SimulateOptions {
                data,
                window_days,
                live,
                log,
            };
            simulate(&config, &options).and_then(|result| result.ensure_no_mismatch())
        }
        Command::Check { config } => check(&config),
        Command::Info { data } => info_command(&data),
        Command::Publish { config, end } => publish(&config, end.as_deref()),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, DipLadderError> {
    FileConfigAdapter::from_file(path).map_err(|e| DipLadderError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

pub fn build_simulation_config(
    adapter: &dyn ConfigPort,
) -> Result<SimulationConfig, DipLadderError> {
    validate_simulation_config(adapter)?;
    Ok(SimulationConfig {
        initial_cash: required_f64(adapter, SIMULATION, "initial_cash")?,
        investment_per_buy: required_f64(adapter, SIMULATION, "investment_per_buy")?,
        drop_step: required_f64(adapter, SIMULATION, "drop_step")?,
        window_days: optional_u32(adapter, SIMULATION, "window_days")?,
        anchor: required_enum(adapter, SIMULATION, "anchor")?,
        sell: required_enum(adapter, SIMULATION, "sell_policy")?,
        mode: required_enum(adapter, SIMULATION, "mode")?,
    })
}

pub fn apply_overrides(
    mut config: SimulationConfig,
    options: &SimulateOptions,
) -> SimulationConfig {
    if options.window_days.is_some() {
        config.window_days = options.window_days;
    }
    if options.live {
        config.mode = RunMode::Live;
    }
    config
}

pub fn resolve_data_path(
    data_override: Option<&Path>,
    adapter: &dyn ConfigPort,
) -> Result<PathBuf, DipLadderError> {
    match data_override {
        Some(path) => Ok(path.to_path_buf()),
        None => required_string(adapter, DATA, "path").map(PathBuf::from),
    }
}

/// Load config and data, run the ladder, print the report. Failed buys are
/// left in the returned tally for the caller to escalate.
pub fn simulate(
    config_path: &Path,
    options: &SimulateOptions,
) -> Result<SimulationResult, DipLadderError> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    let config = apply_overrides(build_simulation_config(&adapter)?, options);

    let data_path = resolve_data_path(options.data.as_deref(), &adapter)?;
    eprintln!("Reading prices from {}", data_path.display());
    let series = read_series(&data_path)?;
    if !series.skipped.is_empty() {
        eprintln!("Skipped {} malformed rows", series.skipped.len());
    }

    let records = series.window(config.window_days);
    info!(
        records = records.len(),
        mode = %config.mode,
        anchor = %config.anchor,
        sell = %config.sell,
        "starting simulation"
    );
    let result = simulator::run(&config, records);

    print_report(&result);

    if let Some(log_path) = &options.log {
        CsvReportAdapter.write(&result, &log_path.to_string_lossy())?;
        eprintln!("\nDecision log written to: {}", log_path.display());
    }
    Ok(result)
}

fn check_label(check: BuyCheck) -> &'static str {
    match check {
        BuyCheck::NotTriggered => "-",
        BuyCheck::Passed => "passed",
        BuyCheck::Failed => "FAILED",
        BuyCheck::SkippedForCash => "no cash",
        BuyCheck::Unlabelled => "no label",
    }
}

fn decision_label(decision: Decision) -> &'static str {
    match decision {
        Decision::NoAction => "-",
        Decision::Buy => "BUY",
        Decision::Sell => "SELL",
        Decision::BuyThenSell => "BUY+SELL",
    }
}

pub fn print_report(result: &SimulationResult) {
    eprintln!(
        "\n{:<12} {:>12} {:>12} {:>9} {:>9} {:>14} {:>5}",
        "Date", "Low", "Trigger", "Decision", "Check", "Cash", "Open"
    );
    for o in &result.outcomes {
        eprintln!(
            "{:<12} {:>12.4} {:>12.4} {:>9} {:>9} {:>14.2} {:>5}",
            o.date.format(DATE_FORMAT).to_string(),
            o.low_price,
            o.trigger_price,
            decision_label(o.decision),
            check_label(o.buy_check),
            o.cash_balance,
            o.open_positions,
        );
    }

    let t = &result.tally;
    eprintln!("\n=== Results ===");
    eprintln!("Records:          {}", t.records);
    eprintln!("Passed buys:      {}", t.passed_buys);
    eprintln!("Failed buys:      {}", t.failed_buys);
    eprintln!("Skipped (cash):   {}", t.skipped_for_cash);
    eprintln!("Unlabelled hits:  {}", t.unlabelled_triggers);
    eprintln!("Sells:            {}", t.sells);
    eprintln!("Ignored sells:    {}", t.ignored_sells);
    eprintln!("Final cash:       {:.2}", result.final_cash);
    eprintln!("Open positions:   {}", result.open_position_count());
}

pub fn check(config_path: &Path) -> Result<(), DipLadderError> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;

    let config = build_simulation_config(&adapter)?;
    eprintln!("\nSimulation:");
    eprintln!("  initial_cash:       {:.2}", config.initial_cash);
    eprintln!("  investment_per_buy: {:.2}", config.investment_per_buy);
    eprintln!("  drop_step:          {}", config.drop_step);
    match config.window_days {
        Some(days) => eprintln!("  window_days:        {}", days),
        None => eprintln!("  window_days:        (all history)"),
    }
    eprintln!("  anchor:             {}", config.anchor);
    eprintln!("  sell_policy:        {}", config.sell);
    eprintln!("  mode:               {}", config.mode);

    if adapter.get_string(PUBLISH, "symbols").is_some() {
        validate_publish_config(&adapter)?;
        let symbols = adapter.get_list(PUBLISH, "symbols").unwrap_or_default();
        eprintln!("\nPublish:");
        eprintln!("  symbols: {}", symbols.join(", "));
        eprintln!(
            "  repo:    {} ({})",
            required_string(&adapter, PUBLISH, "repo")?,
            required_string(&adapter, PUBLISH, "branch")?
        );
    }

    eprintln!("\nConfiguration is valid");
    Ok(())
}

pub fn describe_series(series: &NormalizedSeries) -> String {
    let mut out = String::new();
    match (series.start_date(), series.end_date()) {
        (Some(start), Some(end)) => out.push_str(&format!(
            "{} to {} ({} records)\n",
            start.format(DATE_FORMAT),
            end.format(DATE_FORMAT),
            series.len()
        )),
        _ => out.push_str("no usable records\n"),
    }
    let labelled = series.iter().filter(|r| r.recorded_action.is_some()).count();
    if labelled > 0 {
        out.push_str(&format!("{labelled} records carry an action label\n"));
    }
    for skipped in &series.skipped {
        out.push_str(&format!("  row {}: {}\n", skipped.row, skipped.reason));
    }
    out
}

fn info_command(data_path: &Path) -> Result<(), DipLadderError> {
    let series = read_series(data_path)?;
    eprint!("{}", describe_series(&series));
    Ok(())
}

/// Token from the environment, after loading an optional `.env` file.
pub fn read_token() -> Result<String, DipLadderError> {
    let _ = dotenvy::dotenv();
    std::env::var(TOKEN_ENV)
        .ok()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| DipLadderError::MissingCredential {
            name: TOKEN_ENV.to_string(),
        })
}

pub fn build_github_config(
    adapter: &dyn ConfigPort,
    token: String,
) -> Result<GitHubConfig, DipLadderError> {
    Ok(GitHubConfig {
        api_url: adapter
            .get_string(PUBLISH, "api_url")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        repo: required_string(adapter, PUBLISH, "repo")?,
        branch: required_string(adapter, PUBLISH, "branch")?,
        token,
    })
}

pub fn summarize_publish(reports: &[SymbolReport]) -> Result<(), DipLadderError> {
    eprintln!("\n=== Publish Summary ===");
    for r in reports {
        let status = match &r.status {
            SymbolStatus::Published(outcome) => format!("{outcome:?}"),
            SymbolStatus::NoData => "no data".to_string(),
            SymbolStatus::Failed(reason) => format!("failed: {reason}"),
        };
        eprintln!("  {}: {} ({} bars) {}", r.symbol, r.file_name, r.bars, status);
    }

    let failed: Vec<&SymbolReport> = reports
        .iter()
        .filter(|r| matches!(r.status, SymbolStatus::Failed(_)))
        .collect();
    match failed.first() {
        Some(first) => Err(DipLadderError::Publish {
            path: first.file_name.clone(),
            reason: format!("{} of {} symbols failed", failed.len(), reports.len()),
        }),
        None => Ok(()),
    }
}

fn publish(config_path: &Path, end_override: Option<&str>) -> Result<(), DipLadderError> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    validate_publish_config(&adapter)?;

    let symbols = adapter.get_list(PUBLISH, "symbols").unwrap_or_default();
    let start: NaiveDate = required_date(&adapter, PUBLISH, "start_date")?;
    let end = match end_override {
        Some(s) => parse_date(s, PUBLISH, "end")?,
        None => Local::now().date_naive(),
    };
    let output_dir = adapter.get_string(PUBLISH, "output_dir").map(PathBuf::from);

    let github = GitHubAdapter::new(build_github_config(&adapter, read_token()?)?)?;
    let yahoo = YahooAdapter::new(
        &adapter
            .get_string(PUBLISH, "data_url")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
    )?;

    let reports = run_publish_pipeline(
        &yahoo,
        &github,
        &symbols,
        start,
        end,
        output_dir.as_deref(),
    );
    summarize_publish(&reports)
}
