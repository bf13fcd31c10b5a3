use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory under the home directory holding data and persisted options.
pub const APP_DIR: &str = ".booking-analytics";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Analytics over scheduled-meeting exports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "booking-analytics",
    about = "Analytics over scheduled-meeting exports",
    version
)]
pub struct Settings {
    /// Data file or directory of .json/.jsonl exports
    #[arg(long)]
    pub data_path: Option<PathBuf>,

    /// Reporting timezone for hour/day/month buckets ("auto" = system)
    #[arg(long, default_value = "UTC")]
    pub timezone: String,

    /// Output format
    #[arg(long, default_value = "pretty", value_parser = ["json", "pretty", "summary"])]
    pub output: String,

    /// Keep running and refresh periodically
    #[arg(long)]
    pub watch: bool,

    /// Refresh interval in seconds for --watch (1-3600)
    #[arg(long, default_value = "60", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub refresh_interval: u64,

    /// Seconds a published snapshot is served without refetching
    #[arg(long, default_value = "30")]
    pub cache_ttl: u64,

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

/// Persisted last-used parameters saved to `~/.booking-analytics/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_ttl: Option<u64>,
}

/// `~/.booking-analytics`, or `./.booking-analytics` without a home directory.
pub fn app_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl LastUsedParams {
    pub fn config_path() -> PathBuf {
        app_dir().join("last_used.json")
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(APP_DIR).join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    ///
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to `path`, creating parent directories if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Delete the config file at `path` if it exists.
    pub fn clear_at(path: &Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse the process arguments, merge last-used values and persist the result.
    pub fn load_with_last_used() -> Result<Self, clap::Error> {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Parse `args`, fill options not given on the command line from the
    /// params stored at `config_path`, then persist the merged values.
    ///
    /// With `--clear` the stored params are deleted and nothing is merged.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &Path,
    ) -> Result<Self, clap::Error> {
        let matches = Settings::command().try_get_matches_from(args.clone())?;
        let mut settings = Settings::try_parse_from(args)?;

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Ok(settings.resolved());
        }

        let last = LastUsedParams::load_from(config_path);

        // clap keys arg ids by field name (underscores), not by flag spelling.
        if settings.data_path.is_none() {
            settings.data_path = last.data_path;
        }
        if !is_arg_explicitly_set(&matches, "timezone") {
            if let Some(v) = last.timezone {
                settings.timezone = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "output") {
            if let Some(v) = last.output {
                settings.output = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "refresh_interval") {
            if let Some(v) = last.refresh_interval.filter(|v| (1..=3600).contains(v)) {
                settings.refresh_interval = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "cache_ttl") {
            if let Some(v) = last.cache_ttl {
                settings.cache_ttl = v;
            }
        }

        let settings = settings.resolved();
        let _ = LastUsedParams::from(&settings).save_to(config_path);
        Ok(settings)
    }

    /// Resolve `"auto"` timezone and apply the `--debug` flag.
    fn resolved(mut self) -> Self {
        if self.timezone.eq_ignore_ascii_case("auto") {
            self.timezone = crate::time_utils::get_system_timezone();
        }
        if self.debug {
            self.log_level = "DEBUG".to_string();
        }
        self
    }

    /// The configured data path, or `~/.booking-analytics/data`.
    pub fn effective_data_path(&self) -> PathBuf {
        self.data_path
            .clone()
            .unwrap_or_else(|| app_dir().join("data"))
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            data_path: s.data_path.clone(),
            timezone: Some(s.timezone.clone()),
            output: Some(s.output.clone()),
            refresh_interval: Some(s.refresh_interval),
            cache_ttl: Some(s.cache_ttl),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line.
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
