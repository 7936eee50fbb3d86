//! Runtime records for matched filesystem entries.

use std::path::{Path, PathBuf};
use std::time::Instant;

use super::events::WatchHandle;
use super::tree::EdgeId;
use crate::config::{MonitorConfig, MonitorId};
use crate::reader::{RateLimiter, ResumeKey, SubmitBatch};

/// Process-unique id of an active object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u64);

/// One monitor's stream over a matched file.
#[derive(Debug)]
pub struct InstanceStream<H> {
    pub(crate) monitor: MonitorId,
    pub(crate) key: ResumeKey,
    pub(crate) handle: Option<H>,
    pub(crate) batch: SubmitBatch,
    pub(crate) limiter: RateLimiter,
    pub(crate) records_since_persist: usize,
    pub(crate) last_activity: Instant,
}

impl<H> InstanceStream<H> {
    pub(crate) fn new(monitor: MonitorId, config: &MonitorConfig, ino: u64, name: &Path) -> Self {
        Self {
            monitor,
            key: ResumeKey::derive(ino, config),
            handle: None,
            batch: SubmitBatch::new(config.max_submit_at_once),
            limiter: RateLimiter::new(
                name.display().to_string(),
                config.rate_limit_interval(),
                config.rate_limit_burst,
            ),
            records_since_persist: 0,
            last_activity: Instant::now(),
        }
    }

    /// Monitor this stream reads for.
    #[must_use]
    pub const fn monitor(&self) -> MonitorId {
        self.monitor
    }

    /// Key the position is persisted under.
    #[must_use]
    pub const fn key(&self) -> &ResumeKey {
        &self.key
    }

    /// Whether the reader currently has the file open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.handle.is_some()
    }
}

/// One concrete file or directory matched by a pattern edge.
///
/// Owned by the live list of its edge. Dropping it is the terminal state;
/// a reappearing entry always gets a new object.
#[derive(Debug)]
pub struct ActiveObject<H> {
    pub(crate) id: ObjectId,
    pub(crate) name: PathBuf,
    pub(crate) edge: EdgeId,
    pub(crate) ino: u64,
    pub(crate) dev: u64,
    pub(crate) watch: Option<WatchHandle>,
    pub(crate) streams: Vec<InstanceStream<H>>,
}

impl<H> ActiveObject<H> {
    /// Object id.
    #[must_use]
    pub const fn id(&self) -> ObjectId {
        self.id
    }

    /// Resolved path.
    #[must_use]
    pub fn name(&self) -> &Path {
        &self.name
    }

    /// Owning edge.
    #[must_use]
    pub const fn edge(&self) -> EdgeId {
        self.edge
    }

    /// Inode number at discovery.
    #[must_use]
    pub const fn ino(&self) -> u64 {
        self.ino
    }

    /// Device number at discovery.
    #[must_use]
    pub const fn dev(&self) -> u64 {
        self.dev
    }

    /// Backend watch, if registered.
    #[must_use]
    pub const fn watch(&self) -> Option<WatchHandle> {
        self.watch
    }

    /// Per-monitor streams; empty for directories.
    #[must_use]
    pub fn streams(&self) -> &[InstanceStream<H>] {
        &self.streams
    }
}
