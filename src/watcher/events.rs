//! Backend-neutral change events.

#![allow(clippy::missing_const_for_fn)]

use std::path::PathBuf;

/// Backend-assigned watch identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatchHandle(pub u64);

impl std::fmt::Display for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a watch is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchInterest {
    /// Entries created, deleted or renamed inside a directory.
    Directory,
    /// Data appended to a file.
    File,
}

/// Kind of a raw change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// An entry appeared in a watched directory.
    Created,
    /// An entry disappeared from a watched directory.
    Deleted,
    /// An entry was renamed into or out of a watched directory.
    Renamed,
    /// A watched file was written.
    Modified,
    /// Events were lost; everything must be re-walked.
    Rescan,
}

impl EventKind {
    /// Whether this changes the set of entries in a directory.
    #[must_use]
    pub fn is_structural(self) -> bool {
        matches!(self, Self::Created | Self::Deleted | Self::Renamed)
    }
}

/// One event as delivered by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Watch the event was raised on; `None` only for [`EventKind::Rescan`].
    pub handle: Option<WatchHandle>,
    /// What happened.
    pub kind: EventKind,
    /// Entry name the event refers to, when the backend reports one.
    pub name: Option<PathBuf>,
}

impl RawEvent {
    /// Create an event on a watch.
    #[must_use]
    pub fn new(handle: WatchHandle, kind: EventKind, name: Option<PathBuf>) -> Self {
        Self {
            handle: Some(handle),
            kind,
            name,
        }
    }

    /// Create a rescan request.
    #[must_use]
    pub fn rescan() -> Self {
        Self {
            handle: None,
            kind: EventKind::Rescan,
            name: None,
        }
    }
}

/// Events collected during one wait, with duplicates folded.
///
/// Repeated writes to one file or a burst of creates in one directory
/// only need to be acted on once per wait.
#[derive(Debug, Default)]
pub struct EventBatch {
    events: Vec<RawEvent>,
    rescan: bool,
}

impl EventBatch {
    /// Create a new empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event to the batch.
    pub fn add(&mut self, event: RawEvent) {
        if self.rescan {
            return;
        }
        if event.kind == EventKind::Rescan {
            self.rescan = true;
            self.events.clear();
            self.events.push(event);
            return;
        }
        let duplicate = self.events.iter().any(|e| {
            e.handle == event.handle
                && (e.kind == event.kind || (e.kind.is_structural() && event.kind.is_structural()))
        });
        if !duplicate {
            self.events.push(event);
        }
    }

    /// Check if batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Take the folded events in arrival order.
    #[must_use]
    pub fn into_events(self) -> Vec<RawEvent> {
        self.events
    }
}
