//! Change-detection backends.
//!
//! Two strategies sit behind [`ChangeBackend`]:
//! - **Polling** never registers watches; the worker re-walks the whole
//!   tree every poll interval.
//! - **Notify** registers one OS watch per active object and reports raw
//!   events that the engine maps back through its watch index.
//!
//! The engine code is identical for both; only the worker loop differs.

use std::path::Path;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::events::{RawEvent, WatchHandle, WatchInterest};
use super::native::NotifyBackend;
use crate::config::WatchMode;
use crate::Result;

/// Longest uninterrupted sleep of the polling backend.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Source of change signals.
pub trait ChangeBackend: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Whether the backend delivers events (and therefore wants watches).
    fn is_event_driven(&self) -> bool;

    /// Register interest in `path`. `Ok(None)` means the backend does not
    /// use watches.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses the watch.
    fn add_watch(&mut self, path: &Path, interest: WatchInterest) -> Result<Option<WatchHandle>>;

    /// Drop a watch. Unknown handles are ignored.
    fn remove_watch(&mut self, handle: WatchHandle);

    /// Block for at most `timeout` and return whatever arrived.
    ///
    /// # Errors
    ///
    /// Returns an error if the event source is gone.
    fn wait(&mut self, timeout: Duration) -> Result<Vec<RawEvent>>;
}

/// Stat-and-glob polling: no watches, `wait` just sleeps.
#[derive(Debug)]
pub struct PollBackend {
    cancel: CancellationToken,
}

impl PollBackend {
    /// Create a polling backend that wakes early when `cancel` fires.
    #[must_use]
    pub const fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }
}

impl ChangeBackend for PollBackend {
    fn name(&self) -> &'static str {
        "poll"
    }

    fn is_event_driven(&self) -> bool {
        false
    }

    fn add_watch(&mut self, _path: &Path, _interest: WatchInterest) -> Result<Option<WatchHandle>> {
        Ok(None)
    }

    fn remove_watch(&mut self, _handle: WatchHandle) {}

    fn wait(&mut self, timeout: Duration) -> Result<Vec<RawEvent>> {
        let deadline = Instant::now() + timeout;
        while !self.cancel.is_cancelled() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
        Ok(Vec::new())
    }
}

/// Create the backend for `mode`.
///
/// If native notification cannot be initialized, falls back to polling.
pub fn create_backend(mode: WatchMode, cancel: &CancellationToken) -> Box<dyn ChangeBackend> {
    match mode {
        WatchMode::Poll => Box::new(PollBackend::new(cancel.clone())),
        WatchMode::Notify => match NotifyBackend::new() {
            Ok(backend) => {
                tracing::info!(backend = backend.name(), "Using native change notification");
                Box::new(backend)
            }
            Err(e) => {
                tracing::warn!(
                    "Native change notification unavailable ({e}), falling back to polling"
                );
                Box::new(PollBackend::new(cancel.clone()))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_backend_has_no_watches() {
        let mut backend = PollBackend::new(CancellationToken::new());
        assert!(!backend.is_event_driven());
        assert_eq!(backend.name(), "poll");
        let handle = backend
            .add_watch(Path::new("/tmp"), WatchInterest::Directory)
            .unwrap();
        assert!(handle.is_none());
    }

    #[test]
    fn test_poll_backend_waits() {
        let mut backend = PollBackend::new(CancellationToken::new());
        let start = Instant::now();
        let events = backend.wait(Duration::from_millis(150)).unwrap();
        assert!(events.is_empty());
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn test_poll_backend_wakes_on_cancel() {
        let cancel = CancellationToken::new();
        let mut backend = PollBackend::new(cancel.clone());
        cancel.cancel();

        let start = Instant::now();
        backend.wait(Duration::from_secs(30)).unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_create_poll_backend() {
        let backend = create_backend(WatchMode::Poll, &CancellationToken::new());
        assert!(!backend.is_event_driven());
    }
}
