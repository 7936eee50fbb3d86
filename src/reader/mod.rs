//! Stream reading: the collaborator that turns a matched file into records.
//!
//! The reconciliation engine only talks to readers through [`StreamReader`];
//! [`FileStreamReader`] is the line-oriented implementation used by the
//! daemon. Records flow into a [`RecordSink`] in [`SubmitBatch`]es, with a
//! per-stream [`RateLimiter`] in front.

mod file;
mod ratelimit;
mod record;

pub use file::{file_identity, FileHandle, FileStreamReader};
pub use ratelimit::RateLimiter;
pub use record::{LogRecord, RecordSink, SharedSink, SubmitBatch};

use std::fmt;
use std::path::Path;

use crate::config::MonitorConfig;
use crate::Result;

const KEY_PREFIX: &str = "filetail-state";

/// Identifies a stream's persisted read position.
///
/// Derived from the inode and the owning monitor, never from the file name,
/// so a renamed file resumes where it stopped and two monitors reading the
/// same file keep separate positions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResumeKey(String);

impl ResumeKey {
    /// Derive the key for `ino` as read by `monitor`.
    #[must_use]
    pub fn derive(ino: u64, monitor: &MonitorConfig) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(monitor.file.as_bytes());
        hasher.update(&[0]);
        hasher.update(monitor.tag.as_bytes());
        let hex = hasher.finalize().to_hex();
        Self(format!("{KEY_PREFIX}:{ino}:{}", &hex[..16]))
    }

    /// The key as stored.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResumeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-stream options taken from the monitor when opening.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Start at end of file when nothing is persisted.
    pub fresh_start_tail: bool,
    /// Restart at 0 when the file shrinks below the read position.
    pub reopen_on_truncate: bool,
}

impl From<&MonitorConfig> for OpenOptions {
    fn from(monitor: &MonitorConfig) -> Self {
        Self {
            fresh_start_tail: monitor.fresh_start_tail,
            reopen_on_truncate: monitor.reopen_on_truncate,
        }
    }
}

/// Result of one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// Lines handed to the emit callback.
    pub lines: usize,
    /// Read position after the poll.
    pub offset: u64,
}

impl PollOutcome {
    /// Whether the poll produced anything.
    #[must_use]
    pub const fn had_data(&self) -> bool {
        self.lines > 0
    }
}

/// Reads one stream per (file, monitor) pair and tracks its position.
///
/// `emit` receives each complete line and the byte offset it started at.
pub trait StreamReader {
    /// Open state for one stream.
    type Handle;

    /// Open `path`, resuming from the position stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the stored state
    /// cannot be read.
    fn open(&mut self, key: &ResumeKey, path: &Path, options: OpenOptions)
        -> Result<Self::Handle>;

    /// Read up to `max_lines` lines (0 = all available).
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    fn poll(
        &mut self,
        handle: &mut Self::Handle,
        max_lines: usize,
        emit: &mut dyn FnMut(String, u64),
    ) -> Result<PollOutcome>;

    /// Store the handle's current position under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the state store rejects the write.
    fn persist(&mut self, handle: &Self::Handle, key: &ResumeKey) -> Result<()>;

    /// Release the handle.
    fn close(&mut self, handle: Self::Handle);

    /// Forget the position stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the state store rejects the delete.
    fn remove_state(&mut self, key: &ResumeKey) -> Result<()>;
}
