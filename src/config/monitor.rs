//! Per-pattern monitor declarations.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

/// Default number of records buffered before a submit.
pub const DEFAULT_MAX_SUBMIT_AT_ONCE: usize = 1024;

/// Index of a monitor within [`Config::monitors`](super::Config).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonitorId(pub usize);

/// One `[[monitor]]` table: a path pattern plus the options applied to every
/// file it matches.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    /// Path or shell-style wildcard pattern.
    pub file: String,

    /// Tag attached to every record read through this monitor.
    pub tag: String,

    /// Seconds without new data before a poll is forced. Falls back to the
    /// module-wide value when unset; 0 disables.
    #[serde(default)]
    pub read_timeout_secs: Option<u64>,

    /// Persist the read position every N records (0 = on close only).
    #[serde(default)]
    pub persist_state_interval: usize,

    /// Remove persisted state when the file itself disappears.
    #[serde(default = "default_true")]
    pub delete_state_on_delete: bool,

    /// Upper bound of lines read per poll (0 = unlimited).
    #[serde(default)]
    pub max_lines_at_once: usize,

    /// Records buffered before they are handed downstream.
    #[serde(default = "default_max_submit")]
    pub max_submit_at_once: usize,

    /// Start at end of file when no state exists.
    #[serde(default)]
    pub fresh_start_tail: bool,

    /// Restart at offset 0 when the file shrinks below the read position.
    #[serde(default)]
    pub reopen_on_truncate: bool,

    /// Rate-limit window in seconds (0 = unlimited).
    #[serde(default)]
    pub rate_limit_interval_secs: u64,

    /// Records allowed per rate-limit window.
    #[serde(default = "default_burst")]
    pub rate_limit_burst: u32,

    /// Warn at startup when a literal file does not exist yet.
    #[serde(default = "default_true")]
    pub file_not_found_error: bool,
}

const fn default_true() -> bool {
    true
}

const fn default_max_submit() -> usize {
    DEFAULT_MAX_SUBMIT_AT_ONCE
}

const fn default_burst() -> u32 {
    10_000
}

impl MonitorConfig {
    /// Create a monitor with default options.
    pub fn new(file: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            tag: tag.into(),
            read_timeout_secs: None,
            persist_state_interval: 0,
            delete_state_on_delete: true,
            max_lines_at_once: 0,
            max_submit_at_once: DEFAULT_MAX_SUBMIT_AT_ONCE,
            fresh_start_tail: false,
            reopen_on_truncate: false,
            rate_limit_interval_secs: 0,
            rate_limit_burst: default_burst(),
            file_not_found_error: true,
        }
    }

    /// Effective read timeout, `None` when disabled.
    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> {
        match self.read_timeout_secs {
            Some(0) | None => None,
            Some(secs) => Some(Duration::from_secs(secs)),
        }
    }

    /// Rate-limit window, `None` when unlimited.
    #[must_use]
    pub fn rate_limit_interval(&self) -> Option<Duration> {
        (self.rate_limit_interval_secs > 0)
            .then(|| Duration::from_secs(self.rate_limit_interval_secs))
    }

    /// Whether the pattern contains glob metacharacters.
    #[must_use]
    pub fn has_wildcard(&self) -> bool {
        self.file.contains(['*', '?', '['])
    }

    /// Rewrite `file` into an absolute pattern relative to `cwd`.
    ///
    /// A leading `./` is dropped. Wildcards are kept verbatim.
    pub fn normalize(&mut self, cwd: &Path) {
        let trimmed = self.file.strip_prefix("./").unwrap_or(&self.file);
        if !trimmed.starts_with('/') {
            let base = cwd.display().to_string();
            self.file = format!("{}/{}", base.trim_end_matches('/'), trimmed);
        } else if trimmed.len() != self.file.len() {
            self.file = trimmed.to_string();
        }
    }

    /// Validate this monitor.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern or tag is empty or the batch size is 0.
    pub fn validate(&self) -> Result<()> {
        if self.file.trim().is_empty() {
            return Err(Error::config("monitor file pattern cannot be empty"));
        }
        if self.tag.is_empty() {
            return Err(Error::config(format!(
                "monitor '{}' has no tag",
                self.file
            )));
        }
        if self.max_submit_at_once == 0 {
            return Err(Error::config(format!(
                "monitor '{}': max_submit_at_once cannot be 0",
                self.file
            )));
        }
        Ok(())
    }
}
