//! Native change notification using the `notify` crate.
//!
//! Uses OS-level notifications (inotify on Linux, FSEvents on macOS).
//! Watches are non-recursive; the pattern tree decides what to watch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use notify::event::ModifyKind;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

use super::backend::ChangeBackend;
use super::events::{EventBatch, EventKind, RawEvent, WatchHandle, WatchInterest};
use crate::error::WatcherError;
use crate::Result;

#[derive(Debug)]
struct Registration {
    path: PathBuf,
    interest: WatchInterest,
}

/// Event-driven backend.
///
/// Several handles may refer to the same path; the OS watch is added with
/// the first and removed with the last.
pub struct NotifyBackend {
    watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    next_handle: u64,
    handles: HashMap<WatchHandle, Registration>,
    by_path: HashMap<PathBuf, Vec<WatchHandle>>,
}

impl NotifyBackend {
    /// Create the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS notification facility cannot be opened.
    pub fn new() -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )
        .map_err(|e| WatcherError::Init {
            backend: "notify",
            reason: e.to_string(),
        })?;

        Ok(Self {
            watcher,
            rx,
            next_handle: 1,
            handles: HashMap::new(),
            by_path: HashMap::new(),
        })
    }

    /// Number of distinct paths with an OS watch.
    #[must_use]
    pub fn os_watch_count(&self) -> usize {
        self.by_path.len()
    }

    fn handles_for(&self, path: &Path, interest: WatchInterest) -> impl Iterator<Item = WatchHandle> + '_ {
        self.by_path
            .get(path)
            .into_iter()
            .flatten()
            .copied()
            .filter(move |h| self.handles.get(h).is_some_and(|r| r.interest == interest))
    }

    fn translate(&self, event: &Event, batch: &mut EventBatch) {
        if event.need_rescan() {
            batch.add(RawEvent::rescan());
            return;
        }

        let kind = match event.kind {
            notify::EventKind::Create(_) => EventKind::Created,
            notify::EventKind::Remove(_) => EventKind::Deleted,
            notify::EventKind::Modify(ModifyKind::Name(_)) => EventKind::Renamed,
            notify::EventKind::Modify(ModifyKind::Metadata(_))
            | notify::EventKind::Access(_)
            | notify::EventKind::Other => return,
            notify::EventKind::Modify(_) | notify::EventKind::Any => EventKind::Modified,
        };

        for path in &event.paths {
            if kind.is_structural() {
                let Some(dir) = path.parent() else { continue };
                let name = path.file_name().map(PathBuf::from);
                for handle in self.handles_for(dir, WatchInterest::Directory) {
                    batch.add(RawEvent::new(handle, kind, name.clone()));
                }
            } else {
                for handle in self.handles_for(path, WatchInterest::File) {
                    batch.add(RawEvent::new(handle, kind, None));
                }
            }
        }
    }

    fn collect(&self, first: notify::Result<Event>, batch: &mut EventBatch) {
        match first {
            Ok(event) => self.translate(&event, batch),
            Err(e) => {
                tracing::warn!("Change notification error: {e}");
                if matches!(e.kind, notify::ErrorKind::MaxFilesWatch) {
                    batch.add(RawEvent::rescan());
                }
            }
        }
    }
}

impl std::fmt::Debug for NotifyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyBackend")
            .field("handles", &self.handles.len())
            .field("os_watches", &self.by_path.len())
            .finish_non_exhaustive()
    }
}

impl ChangeBackend for NotifyBackend {
    fn name(&self) -> &'static str {
        #[cfg(target_os = "linux")]
        {
            "inotify"
        }
        #[cfg(target_os = "macos")]
        {
            "fsevents"
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            "notify"
        }
    }

    fn is_event_driven(&self) -> bool {
        true
    }

    fn add_watch(&mut self, path: &Path, interest: WatchInterest) -> Result<Option<WatchHandle>> {
        let shared = self.by_path.get(path).is_some_and(|h| !h.is_empty());
        if !shared {
            self.watcher
                .watch(path, RecursiveMode::NonRecursive)
                .map_err(|e| WatcherError::watch_failed(path, e))?;
        }

        let handle = WatchHandle(self.next_handle);
        self.next_handle += 1;
        self.handles.insert(
            handle,
            Registration {
                path: path.to_path_buf(),
                interest,
            },
        );
        self.by_path.entry(path.to_path_buf()).or_default().push(handle);

        tracing::trace!(path = %path.display(), %handle, ?interest, shared, "Watch added");
        Ok(Some(handle))
    }

    fn remove_watch(&mut self, handle: WatchHandle) {
        let Some(reg) = self.handles.remove(&handle) else {
            return;
        };
        let Some(handles) = self.by_path.get_mut(&reg.path) else {
            return;
        };
        handles.retain(|h| *h != handle);
        if handles.is_empty() {
            self.by_path.remove(&reg.path);
            // The OS drops watches on deleted paths by itself.
            if let Err(e) = self.watcher.unwatch(&reg.path) {
                tracing::debug!(path = %reg.path.display(), "Unwatch failed: {e}");
            }
        }
        tracing::trace!(path = %reg.path.display(), %handle, "Watch removed");
    }

    fn wait(&mut self, timeout: Duration) -> Result<Vec<RawEvent>> {
        let mut batch = EventBatch::new();

        match self.rx.recv_timeout(timeout) {
            Ok(first) => self.collect(first, &mut batch),
            Err(RecvTimeoutError::Timeout) => return Ok(Vec::new()),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(WatcherError::Channel("notification channel disconnected".into()).into());
            }
        }

        while let Ok(next) = self.rx.try_recv() {
            self.collect(next, &mut batch);
        }

        Ok(batch.into_events())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;

    fn wait_for(
        backend: &mut NotifyBackend,
        pred: impl Fn(&RawEvent) -> bool,
    ) -> Option<RawEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            let events = backend.wait(Duration::from_millis(200)).unwrap();
            if let Some(e) = events.into_iter().find(|e| pred(e)) {
                return Some(e);
            }
        }
        None
    }

    #[test]
    fn test_handles_increase() {
        let tmp = TempDir::new().unwrap();
        let mut backend = NotifyBackend::new().unwrap();
        let a = backend
            .add_watch(tmp.path(), WatchInterest::Directory)
            .unwrap()
            .unwrap();
        let b = backend
            .add_watch(tmp.path(), WatchInterest::Directory)
            .unwrap()
            .unwrap();
        assert!(b > a);
        assert_eq!(backend.os_watch_count(), 1);

        backend.remove_watch(a);
        assert_eq!(backend.os_watch_count(), 1);
        backend.remove_watch(b);
        assert_eq!(backend.os_watch_count(), 0);
    }

    #[test]
    fn test_watch_missing_path_fails() {
        let tmp = TempDir::new().unwrap();
        let mut backend = NotifyBackend::new().unwrap();
        let result = backend.add_watch(&tmp.path().join("nope"), WatchInterest::Directory);
        assert!(result.is_err());
    }

    #[test]
    fn test_create_in_directory_reported() {
        let tmp = TempDir::new().unwrap();
        let mut backend = NotifyBackend::new().unwrap();
        let handle = backend
            .add_watch(tmp.path(), WatchInterest::Directory)
            .unwrap()
            .unwrap();

        std::fs::write(tmp.path().join("new.log"), "x\n").unwrap();

        let event = wait_for(&mut backend, |e| e.kind == EventKind::Created).unwrap();
        assert_eq!(event.handle, Some(handle));
        assert_eq!(event.name, Some(PathBuf::from("new.log")));
    }

    #[test]
    fn test_file_write_reported() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.log");
        std::fs::write(&path, "").unwrap();

        let mut backend = NotifyBackend::new().unwrap();
        let handle = backend
            .add_watch(&path, WatchInterest::File)
            .unwrap()
            .unwrap();

        std::fs::write(&path, "line\n").unwrap();

        let event = wait_for(&mut backend, |e| e.kind == EventKind::Modified).unwrap();
        assert_eq!(event.handle, Some(handle));
    }
}
