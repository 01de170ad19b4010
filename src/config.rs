//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.sltdash.toml` files.

use crate::analysis::aggregator::LIVER_SPECIALTIES;
use crate::cli::{is_http_url, OutputFormat};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = ".sltdash.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// HIS API settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Default output format.
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            format: OutputFormat::default(),
        }
    }
}

fn default_output() -> String {
    "slt_dashboard.md".to_string()
}

/// HIS API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL the feed endpoints live under.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds. Unset means wait for the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    /// Fetch all feeds concurrently.
    #[serde(default = "default_true")]
    pub parallel: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: None,
            parallel: true,
        }
    }
}

fn default_base_url() -> String {
    "http://192.168.15.3/NewHIS/api/his".to_string()
}

fn default_true() -> bool {
    true
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Maximum rows shown per grouped breakdown.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Substring that marks a ward as intensive care.
    #[serde(default = "default_icu_marker")]
    pub icu_marker: String,

    /// Specialities counted as liver services.
    #[serde(default = "default_liver_specialties")]
    pub liver_specialties: Vec<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            icu_marker: default_icu_marker(),
            liver_specialties: default_liver_specialties(),
        }
    }
}

fn default_top_n() -> usize {
    10
}

fn default_icu_marker() -> String {
    "ICU".to_string()
}

fn default_liver_specialties() -> Vec<String> {
    LIVER_SPECIALTIES.iter().map(|s| s.to_string()).collect()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.sltdash.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref base_url) = args.base_url {
            self.source.base_url = base_url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.source.timeout_seconds = Some(timeout);
        }
        if args.sequential {
            self.source.parallel = false;
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }

        if let Some(top_n) = args.top_n {
            self.report.top_n = top_n;
        }
    }

    /// Check values that may come from the file as well as the CLI.
    pub fn validate(&self) -> Result<()> {
        if !is_http_url(&self.source.base_url) {
            bail!(
                "source.base_url must start with 'http://' or 'https://', got '{}'",
                self.source.base_url
            );
        }
        if self.source.timeout_seconds == Some(0) {
            bail!("source.timeout_seconds must be at least 1");
        }
        if self.report.top_n == 0 {
            bail!("report.top_n must be at least 1");
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.source.base_url, "http://192.168.15.3/NewHIS/api/his");
        assert_eq!(config.source.timeout_seconds, None);
        assert!(config.source.parallel);
        assert_eq!(config.report.top_n, 10);
        assert_eq!(config.report.liver_specialties.len(), 3);
        assert!(config
            .report
            .liver_specialties
            .contains(&"Hepatology".to_string()));
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "morning.json"
format = "json"

[source]
base_url = "https://his.example.org/api"
timeout_seconds = 30
parallel = false

[report]
top_n = 5
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "morning.json");
        assert_eq!(config.general.format, OutputFormat::Json);
        assert_eq!(config.source.base_url, "https://his.example.org/api");
        assert_eq!(config.source.timeout_seconds, Some(30));
        assert!(!config.source.parallel);
        assert_eq!(config.report.top_n, 5);
        assert_eq!(config.report.icu_marker, "ICU");
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[source]"));
        assert!(toml_str.contains("[report]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.source.base_url, Config::default().source.base_url);
    }

    #[test]
    fn test_validate_file_values() {
        assert!(Config::default().validate().is_ok());

        let config: Config = toml::from_str("[source]\nbase_url = \"192.168.15.3/NewHIS\"\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("source.base_url"));

        let config: Config = toml::from_str("[source]\ntimeout_seconds = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[report]\ntop_n = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_url_overrides_bad_file_url() {
        let mut config: Config = toml::from_str("[source]\nbase_url = \"his.local\"\n").unwrap();
        let args = crate::cli::Args::parse_from(["sltdash", "--base-url", "http://his.local/api"]);
        config.merge_with_args(&args);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert!(Config::load_from_dir(temp_dir.path()).unwrap().is_none());

        std::fs::write(
            temp_dir.path().join(CONFIG_FILE),
            "[source]\nbase_url = \"http://10.0.0.5/his\"\n",
        )
        .unwrap();
        let config = Config::load_from_dir(temp_dir.path()).unwrap().unwrap();
        assert_eq!(config.source.base_url, "http://10.0.0.5/his");
        assert_eq!(config.general.output, "slt_dashboard.md");

        std::fs::write(temp_dir.path().join(CONFIG_FILE), "[source\n").unwrap();
        assert!(Config::load_from_dir(temp_dir.path()).is_err());
    }
}
