//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use salescycle_core::SalesCycleEngine;
use salescycle_crm::HttpCrmClient;
use salescycle_shared::{
    AppConfig, EngineConfig, EngineState, init_config, load_config, load_config_from,
    resolve_api_key,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// salescycle: sales funnel reporting over CRM job data.
#[derive(Parser)]
#[command(
    name = "salescycle",
    version,
    about = "Build a sales funnel, conversion rates and rep performance from CRM jobs.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch and enrich jobs, then print the funnel report.
    Run {
        /// Report format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Anchor month-to-date and year-to-date figures to this date (YYYY-MM-DD).
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Cap on jobs fetched per milestone (overrides config).
        #[arg(long)]
        max_jobs: Option<usize>,

        /// Read config from this file instead of ~/.salescycle/salescycle.toml.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so JSON reports
/// on stdout stay clean.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "salescycle=info",
        1 => "salescycle=debug",
        _ => "salescycle=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            format,
            as_of,
            max_jobs,
            config,
        } => cmd_run(format, as_of, max_jobs, config).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn cmd_run(
    format: OutputFormat,
    as_of: Option<NaiveDate>,
    max_jobs: Option<usize>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = match &config_path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    let api_key = resolve_api_key(&config)?;

    let client = HttpCrmClient::new(
        &config.crm.base_url()?,
        &api_key,
        Duration::from_secs(config.crm.timeout_secs),
    )?;

    let mut engine_config = EngineConfig::from(&config);
    engine_config.reference_date = as_of;
    if let Some(max) = max_jobs {
        engine_config.max_jobs_per_milestone = max;
    }

    info!(
        base_url = %config.crm.base_url,
        batch_size = engine_config.batch_size,
        max_jobs = engine_config.max_jobs_per_milestone,
        "starting sales cycle run"
    );

    let bar = progress_bar()?;
    let mut last: Option<EngineState> = None;
    {
        let bar = bar.clone();
        let mut sink = |state: EngineState| {
            bar.set_position(u64::from(state.progress));
            bar.set_message(state.phase_message.clone());
            last = Some(state);
        };
        SalesCycleEngine::new(Arc::new(client), engine_config)
            .run(&mut sink)
            .await;
    }
    bar.finish_and_clear();

    let state = last.ok_or_else(|| eyre!("engine produced no snapshots"))?;
    if let Some(error) = &state.error {
        return Err(eyre!("run failed: {error}"));
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&state)?),
        OutputFormat::Text => print_report(&state),
    }

    Ok(())
}

fn progress_bar() -> Result<ProgressBar> {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("=> ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    bar.enable_steady_tick(Duration::from_millis(80));
    Ok(bar)
}

fn print_report(state: &EngineState) {
    println!();
    println!("  Jobs loaded: {}", state.jobs.len());
    println!();
    println!("  Funnel");
    println!("  {:<3} {:<28} {:<10} {:>6} {:>14}", "#", "Stage", "Milestone", "Count", "Value");
    for row in &state.funnel {
        println!(
            "  {:<3} {:<28} {:<10} {:>6} {:>14}",
            row.order,
            row.stage.as_str(),
            row.milestone.query_name(),
            row.count,
            money(row.value)
        );
    }

    println!();
    println!("  Conversions (month to date)");
    if state.conversions.is_empty() {
        println!("  (no classified jobs created this month)");
    }
    for conv in &state.conversions {
        println!("  {:<20} -> {:<20} {:>4}%", conv.from, conv.to, conv.rate);
    }

    println!();
    println!("  Rep performance (month to date)");
    if state.rep_performance.is_empty() {
        println!("  (no owned jobs created this month)");
    } else {
        println!(
            "  {:<24} {:>6} {:>6} {:>9} {:>6} {:>9} {:>14}",
            "Rep", "Leads", "IVS%", "Adjuster%", "Close%", "Approved", "Approved $"
        );
    }
    for rep in &state.rep_performance {
        println!(
            "  {:<24} {:>6} {:>6} {:>9} {:>6} {:>9} {:>14}",
            rep.rep,
            rep.leads,
            rep.ivs_rate,
            rep.adjuster_rate,
            rep.close_rate,
            rep.approved_count,
            money(rep.approved_value)
        );
    }

    println!();
    println!("  Sales YTD: {}", money(state.sales_ytd));
    println!("  Built YTD: {}", money(state.built_ytd));
    println!();
}

fn money(value: f64) -> String {
    format!("${value:.2}")
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
