//! sltdash - morning-meeting dashboard from live HIS feeds
//!
//! Each run is one render cycle: fetch every feed, normalize and check
//! the payloads, aggregate, and write the dashboard.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error, or no feed could reach the HIS host
//!   2 - Some feeds failed and --fail-on-partial is set

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod normalize;
mod report;
mod source;

use analysis::{CycleInfo, PanelSettings};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use cli::{Args, OutputFormat};
use config::Config;
use report::RenderOptions;
use source::{feed_progress, Connector, ConnectorConfig, Feed, FEEDS};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("sltdash v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_cycle(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Dashboard run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .sltdash.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", config::CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Edit it to set the HIS base URL, timeout and report options.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run one fetch-aggregate-render cycle. Returns the exit code.
async fn run_cycle(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate().context("Invalid configuration")?;

    let today = args.date.unwrap_or_else(local_today);
    let connector = Connector::new(&ConnectorConfig {
        base_url: config.source.base_url.clone(),
        timeout_seconds: config.source.timeout_seconds,
    })?;

    // Step 1: fetch every feed
    let feeds: Vec<&Feed> = FEEDS.iter().collect();
    println!("📥 Fetching {} feeds from {}", feeds.len(), connector.base_url());
    println!("   Reporting day: {}", today.format("%Y-%m-%d"));
    println!(
        "   Mode: {}",
        if config.source.parallel {
            "concurrent"
        } else {
            "sequential"
        }
    );

    let progress = feed_progress(feeds.len(), !args.quiet);
    let loads = connector
        .load_all(&feeds, today, config.source.parallel, &progress)
        .await;
    progress.finish_and_clear();

    let unreachable = analysis::host_unreachable(&loads);
    if unreachable {
        error!("No feed could reach the HIS API at {}", connector.base_url());
    }

    // Step 2: aggregate
    println!("\n📊 Building dashboard...");
    let settings = PanelSettings {
        icu_marker: config.report.icu_marker.clone(),
        liver_specialties: config.report.liver_specialties.clone(),
    };
    let dashboard = analysis::build_dashboard(
        loads,
        &settings,
        CycleInfo {
            report_date: today,
            base_url: connector.base_url().to_string(),
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
    );

    // Step 3: render
    let output = match config.general.format {
        OutputFormat::Json => report::generate_json_report(&dashboard)?,
        OutputFormat::Markdown => report::generate_markdown_report(
            &dashboard,
            &RenderOptions {
                top_n: config.report.top_n,
            },
        ),
    };

    let output_path = PathBuf::from(&config.general.output);
    report::write_report(&output, &output_path)
        .with_context(|| format!("Failed to write dashboard to {}", output_path.display()))?;

    print_summary(&dashboard);
    println!("\n✅ Dashboard saved to: {}", output_path.display());

    if unreachable {
        eprintln!(
            "\n⛔ The HIS API at {} could not be reached for any feed.",
            dashboard.metadata.base_url
        );
        return Ok(1);
    }

    if args.fail_on_partial && dashboard.metadata.feeds_failed > 0 {
        eprintln!(
            "\n⛔ {} feed(s) failed. Failing (exit code 2).",
            dashboard.metadata.feeds_failed
        );
        return Ok(2);
    }

    Ok(0)
}

/// Print tiles and feed failures to the console.
fn print_summary(dashboard: &models::Dashboard) {
    println!("\n📋 {}:", dashboard.metadata.title);
    for panel in &dashboard.panels {
        match panel.tile() {
            Some(tile) => println!("   {:<36} {}", panel.title, tile),
            None => println!("   {:<36} ⚠️  unavailable", panel.title),
        }
    }

    let failed = dashboard.failed_panels();
    if failed > 0 {
        println!("   {} of {} panels unavailable", failed, dashboard.panels.len());
    }
    for feed in dashboard.feeds.iter().filter(|f| !f.is_ok()) {
        println!(
            "   ❌ {}: {}",
            feed.name,
            feed.error.as_deref().unwrap_or_default()
        );
    }
}

/// The local calendar date.
fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
