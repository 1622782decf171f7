use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::deriver::IdleThresholds;
use crate::error::Result;
use tracing::warn;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Cloud cost and CO₂ waste reports from resource usage CSVs
#[derive(Parser, Debug, Clone)]
#[command(
    name = "cost-guardian",
    about = "Cloud cost and CO2 waste reports from resource usage CSVs",
    version
)]
pub struct Settings {
    /// Analyse a single CSV file instead of a report directory
    #[arg(long, conflicts_with = "report_dir")]
    pub input: Option<PathBuf>,

    /// Directory holding cloud_cost_report*.csv snapshots
    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    /// View to print
    #[arg(long, default_value = "overview", value_parser = ["overview", "analysis", "detail", "trend", "top"])]
    pub view: String,

    /// Merge older snapshots from the report directory into the trend
    #[arg(long)]
    pub include_history: bool,

    /// How many snapshot files (approx. days) to merge for the trend
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u32).range(2..=90))]
    pub history_files: u32,

    /// Number of days shown in the trend
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u32).range(1..=365))]
    pub trend_days: u32,

    /// Keep resources tagged DoNotStop=True (they are dropped by default)
    #[arg(long)]
    pub include_protected: bool,

    /// Rows in the top-waste ranking
    #[arg(long, default_value = "5")]
    pub top_n: usize,

    /// Only show detail rows with this status (repeatable)
    #[arg(long = "status")]
    pub statuses: Vec<String>,

    /// Only show detail rows of this resource type (repeatable)
    #[arg(long = "resource-type")]
    pub resource_types: Vec<String>,

    /// Write the detail table to this CSV file
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Print JSON instead of tables
    #[arg(long)]
    pub json: bool,

    /// CPU percentage below which a resource counts as idle
    #[arg(long, default_value = "5.0")]
    pub cpu_idle_threshold: f64,

    /// Network KB/s below which a resource counts as idle
    #[arg(long, default_value = "5.0")]
    pub network_idle_threshold: f64,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.cost-guardian/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_files: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".cost-guardian").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        match Self::try_load_from(path) {
            Ok(params) => params,
            Err(e) => {
                warn!("Ignoring saved parameters in {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse persisted params, failing on unreadable or malformed files.
    pub fn try_load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Atomically write params to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;

        // Write to a temp file then rename for atomicity.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &std::path::Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Full implementation – accepts args and an explicit config path so that
    /// tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        // Build raw ArgMatches so we can query ValueSource.
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            if let Err(e) = LastUsedParams::clear_at(config_path) {
                warn!("Could not clear saved parameters: {}", e);
            }
            return Self::apply_debug(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins. `input` is never persisted: a one-off file should
        // not shadow the report directory on the next run.
        if !is_arg_explicitly_set(&matches, "report_dir") && settings.report_dir.is_none() {
            settings.report_dir = last.report_dir;
        }
        if !is_arg_explicitly_set(&matches, "view") {
            if let Some(v) = last.view {
                settings.view = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "history_files") {
            if let Some(v) = last.history_files {
                settings.history_files = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "trend_days") {
            if let Some(v) = last.trend_days {
                settings.trend_days = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "top_n") {
            if let Some(v) = last.top_n {
                settings.top_n = v;
            }
        }

        settings = Self::apply_debug(settings);

        let params = LastUsedParams::from(&settings);
        if let Err(e) = params.save_to(config_path) {
            warn!("Could not save parameters: {}", e);
        }

        settings
    }

    /// `--debug` overrides the log level.
    fn apply_debug(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Idle thresholds for the status rules.
    pub fn thresholds(&self) -> IdleThresholds {
        IdleThresholds {
            cpu_idle_pct: self.cpu_idle_threshold,
            network_idle_kbps: self.network_idle_threshold,
        }
    }

    /// Whether DoNotStop=True resources are dropped before reporting.
    pub fn exclude_protected(&self) -> bool {
        !self.include_protected
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            report_dir: s.report_dir.clone(),
            view: Some(s.view.clone()),
            history_files: Some(s.history_files),
            trend_days: Some(s.trend_days),
            top_n: Some(s.top_n),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
