//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use chrono::NaiveDate;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// sltdash - morning-meeting dashboard from live HIS feeds
///
/// Polls the hospital information system for appointments, admissions,
/// discharges, radiology and OT bookings and bed status, then writes a
/// dashboard of summary tiles and breakdowns.
///
/// Examples:
///   sltdash
///   sltdash --base-url http://his.local/NewHIS/api/his --format json -o today.json
///   sltdash --date 2026-10-15 --sequential
///   sltdash --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Base URL of the HIS report API
    ///
    /// Feed endpoint paths are appended to it.
    #[arg(long, value_name = "URL", env = "SLTDASH_BASE_URL")]
    pub base_url: Option<String>,

    /// Output file path for the dashboard
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .sltdash.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Reporting day (YYYY-MM-DD) used as "today" for date-windowed feeds
    ///
    /// Defaults to the local calendar date.
    #[arg(long, value_name = "DATE")]
    pub date: Option<NaiveDate>,

    /// Request timeout in seconds
    ///
    /// Without it every request waits until the server answers.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Fetch feeds one after another instead of concurrently
    #[arg(long)]
    pub sequential: bool,

    /// Maximum rows per breakdown table
    #[arg(long, value_name = "N")]
    pub top_n: Option<usize>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Exit with code 2 when any feed failed
    ///
    /// Useful for scheduled runs that should alert on partial data.
    #[arg(long)]
    pub fail_on_partial: bool,

    /// Generate a default .sltdash.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the dashboard.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if let Some(ref url) = self.base_url {
            if !is_http_url(url) {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(top_n) = self.top_n {
            if top_n == 0 {
                return Err("Top-n must be at least 1".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

/// Whether `url` uses a scheme the HIS client can fetch.
pub fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
