//! Configuration settings and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::monitor::{MonitorConfig, MonitorId};
use crate::{Error, Result};

/// Change-detection strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    /// Periodic stat/glob walks of the whole pattern tree.
    #[serde(alias = "polling")]
    Poll,
    /// OS change notifications (inotify, kqueue, FSEvents).
    #[default]
    #[serde(alias = "inotify", alias = "native")]
    Notify,
}

impl std::str::FromStr for WatchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "poll" | "polling" => Ok(Self::Poll),
            "notify" | "inotify" | "native" => Ok(Self::Notify),
            _ => Err(format!(
                "invalid watch mode '{s}', valid options: poll, notify"
            )),
        }
    }
}

impl std::fmt::Display for WatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Poll => f.write_str("poll"),
            Self::Notify => f.write_str("notify"),
        }
    }
}

/// Main configuration for the file input module.
#[derive(Debug, Clone)]
pub struct Config {
    /// Change-detection strategy.
    pub mode: WatchMode,

    /// Sleep between full walks in poll mode.
    pub poll_interval: Duration,

    /// Upper bound of a single notification wait in notify mode.
    pub timeout_granularity: Duration,

    /// Module-wide default read timeout in seconds (0 = off).
    pub read_timeout_secs: u64,

    /// Make relative patterns absolute and strip leading `./`.
    pub normalize_path: bool,

    /// Directory holding the resume-state database.
    pub state_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Monitored patterns, in declaration order.
    pub monitors: Vec<MonitorConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: WatchMode::default(),
            poll_interval: Duration::from_secs(10),
            timeout_granularity: Duration::from_secs(1),
            read_timeout_secs: 0,
            normalize_path: true,
            state_dir: PathBuf::from("./data"),
            log_level: "info".to_string(),
            monitors: Vec::new(),
        }
    }
}

/// On-disk layout of the configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    module: ModuleSection,
    #[serde(default, rename = "monitor")]
    monitors: Vec<MonitorConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModuleSection {
    mode: Option<WatchMode>,
    poll_interval_ms: Option<u64>,
    timeout_granularity_ms: Option<u64>,
    read_timeout_secs: Option<u64>,
    normalize_path: Option<bool>,
    state_dir: Option<PathBuf>,
    log_level: Option<String>,
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read config file '{}': {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration TOML.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| Error::config(format!("invalid TOML: {e}")))?;

        let defaults = Self::default();
        let module = file.module;
        Ok(Self {
            mode: module.mode.unwrap_or(defaults.mode),
            poll_interval: module
                .poll_interval_ms
                .map_or(defaults.poll_interval, Duration::from_millis),
            timeout_granularity: module
                .timeout_granularity_ms
                .map_or(defaults.timeout_granularity, Duration::from_millis),
            read_timeout_secs: module.read_timeout_secs.unwrap_or(0),
            normalize_path: module.normalize_path.unwrap_or(defaults.normalize_path),
            state_dir: module.state_dir.unwrap_or(defaults.state_dir),
            log_level: module.log_level.unwrap_or(defaults.log_level),
            monitors: file.monitors,
        })
    }

    /// Resolve per-monitor defaults and normalize patterns.
    ///
    /// Must run once after all overrides are applied and before the pattern
    /// tree is built.
    ///
    /// # Errors
    ///
    /// Returns an error if the working directory is needed but unavailable.
    pub fn prepare(&mut self) -> Result<()> {
        let cwd = if self.normalize_path {
            Some(std::env::current_dir()?)
        } else {
            None
        };

        for monitor in &mut self.monitors {
            if monitor.read_timeout_secs.is_none() {
                monitor.read_timeout_secs = Some(self.read_timeout_secs);
            }
            if self.mode == WatchMode::Notify && monitor.max_lines_at_once > 0 {
                tracing::warn!(
                    file = %monitor.file,
                    "max_lines_at_once is not permitted in notify mode, ignored"
                );
                monitor.max_lines_at_once = 0;
            }
            if let Some(cwd) = &cwd {
                monitor.normalize(cwd);
            }
        }

        Ok(())
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.poll_interval.is_zero() {
            return Err(Error::config("poll_interval cannot be 0"));
        }

        if self.timeout_granularity.is_zero() {
            return Err(Error::config("timeout_granularity cannot be 0"));
        }

        if self.monitors.is_empty() {
            return Err(Error::config(
                "no files configured to be monitored, no input will be gathered",
            ));
        }

        for monitor in &self.monitors {
            monitor.validate()?;
        }

        Ok(())
    }

    /// Look up a monitor by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this configuration.
    #[must_use]
    pub fn monitor(&self, id: MonitorId) -> &MonitorConfig {
        &self.monitors[id.0]
    }

    /// Iterate monitors together with their ids.
    pub fn monitors_with_ids(&self) -> impl Iterator<Item = (MonitorId, &MonitorConfig)> {
        self.monitors
            .iter()
            .enumerate()
            .map(|(i, m)| (MonitorId(i), m))
    }

    /// Whether any monitor has a read timeout configured.
    #[must_use]
    pub fn has_read_timeouts(&self) -> bool {
        self.monitors.iter().any(|m| m.read_timeout().is_some())
    }

    /// Path of the resume-state database.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.state_dir.join("filetail-state.db")
    }
}
