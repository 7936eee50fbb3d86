//! Counters for the watcher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Statistics for file watching.
#[derive(Debug, Default)]
pub struct WatcherStats {
    pub walks: AtomicU64,
    pub objects_created: AtomicU64,
    pub objects_removed: AtomicU64,
    pub lines_submitted: AtomicU64,
    pub lines_dropped: AtomicU64,
    pub watch_failures: AtomicU64,
    pub errors: AtomicU64,
}

impl WatcherStats {
    /// Create new stats tracker.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Get snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> WatcherStatsSnapshot {
        WatcherStatsSnapshot {
            walks: self.walks.load(Ordering::Relaxed),
            objects_created: self.objects_created.load(Ordering::Relaxed),
            objects_removed: self.objects_removed.load(Ordering::Relaxed),
            lines_submitted: self.lines_submitted.load(Ordering::Relaxed),
            lines_dropped: self.lines_dropped.load(Ordering::Relaxed),
            watch_failures: self.watch_failures.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of watcher stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatcherStatsSnapshot {
    pub walks: u64,
    pub objects_created: u64,
    pub objects_removed: u64,
    pub lines_submitted: u64,
    pub lines_dropped: u64,
    pub watch_failures: u64,
    pub errors: u64,
}

impl WatcherStatsSnapshot {
    /// Log the snapshot at info level.
    pub fn log(&self) {
        tracing::info!(
            walks = self.walks,
            created = self.objects_created,
            removed = self.objects_removed,
            submitted = self.lines_submitted,
            dropped = self.lines_dropped,
            watch_failures = self.watch_failures,
            errors = self.errors,
            "Watcher statistics"
        );
    }
}
