//! Reconciliation of the pattern tree against the filesystem.
//!
//! [`Reconciler::walk`] visits every edge top-down. For each edge it first
//! stats the objects it already knows (dropping the ones that are gone),
//! then expands the edge's pattern with `glob` and creates objects for new
//! matches, then descends. In polling mode every file object is also read
//! once per walk. Event-driven backends re-enter the same code through
//! [`Reconciler::on_event`], so both modes match and track files the same
//! way.
//!
//! Everything here runs on the single worker thread.

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use glob::MatchOptions;
use tokio_util::sync::CancellationToken;

use super::active::{ActiveObject, InstanceStream, ObjectId};
use super::backend::ChangeBackend;
use super::events::{EventKind, RawEvent, WatchHandle, WatchInterest};
use super::index::WatchIndex;
use super::stats::WatcherStats;
use super::tree::{EdgeId, NodeId, PatternTree};
use crate::config::Config;
use crate::reader::{
    file_identity, LogRecord, OpenOptions, PollOutcome, RecordSink, ResumeKey,
    StreamReader,
};

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Reader, sink and configuration: what a stream needs to move data.
struct StreamIo<R> {
    config: Config,
    reader: R,
    sink: Box<dyn RecordSink>,
    stats: Arc<WatcherStats>,
}

impl<R: StreamReader> StreamIo<R> {
    fn open_stream(&mut self, stream: &mut InstanceStream<R::Handle>, path: &Path) -> bool {
        let options = OpenOptions::from(self.config.monitor(stream.monitor));
        match self.reader.open(&stream.key, path, options) {
            Ok(handle) => {
                stream.handle = Some(handle);
                true
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), "Cannot open stream, retrying later: {e}");
                false
            }
        }
    }

    fn submit(sink: &mut dyn RecordSink, stats: &WatcherStats, records: Vec<LogRecord>) {
        let n = records.len() as u64;
        match sink.submit(records) {
            Ok(()) => WatcherStats::add(&stats.lines_submitted, n),
            Err(e) => {
                tracing::error!(records = n, "Failed to submit records: {e}");
                WatcherStats::incr(&stats.errors);
            }
        }
    }

    /// Read what is available on one stream. Returns the number of lines.
    fn poll_stream(&mut self, stream: &mut InstanceStream<R::Handle>, path: &Path) -> usize {
        if stream.handle.is_none() && !self.open_stream(stream, path) {
            return 0;
        }
        let monitor = self.config.monitor(stream.monitor);
        let tag = monitor.tag.clone();
        let max_lines = monitor.max_lines_at_once;
        let persist_every = monitor.persist_state_interval;

        let Some(handle) = stream.handle.as_mut() else {
            return 0;
        };
        let sink = self.sink.as_mut();
        let stats = self.stats.as_ref();
        let batch = &mut stream.batch;
        let limiter = &mut stream.limiter;
        let now = Instant::now();

        let mut emit = |message: String, offset: u64| {
            if !limiter.allow(now) {
                WatcherStats::incr(&stats.lines_dropped);
                return;
            }
            let record = LogRecord {
                tag: tag.clone(),
                path: path.to_path_buf(),
                offset,
                message,
            };
            if let Some(full) = batch.push(record) {
                Self::submit(&mut *sink, stats, full);
            }
        };

        let outcome = match self.reader.poll(handle, max_lines, &mut emit) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Read failed: {e}");
                WatcherStats::incr(&self.stats.errors);
                PollOutcome::default()
            }
        };

        let rest = stream.batch.take();
        if !rest.is_empty() {
            Self::submit(self.sink.as_mut(), &self.stats, rest);
        }

        if outcome.had_data() {
            stream.last_activity = now;
            stream.records_since_persist += outcome.lines;
            if persist_every > 0 && stream.records_since_persist >= persist_every {
                self.persist_stream(stream, path);
            }
        }
        outcome.lines
    }

    fn persist_stream(&mut self, stream: &mut InstanceStream<R::Handle>, path: &Path) {
        let Some(handle) = stream.handle.as_ref() else {
            return;
        };
        match self.reader.persist(handle, &stream.key) {
            Ok(()) => stream.records_since_persist = 0,
            Err(e) => {
                tracing::error!(path = %path.display(), key = %stream.key, "Failed to persist read position: {e}");
                WatcherStats::incr(&self.stats.errors);
            }
        }
    }

    fn poll_object(&mut self, obj: &mut ActiveObject<R::Handle>) -> bool {
        let mut had_data = false;
        for stream in &mut obj.streams {
            had_data |= self.poll_stream(stream, &obj.name) > 0;
        }
        had_data
    }

    /// Drain, persist and close every stream of `obj`. Returns the keys whose
    /// state should be removed.
    fn close_object(&mut self, obj: &mut ActiveObject<R::Handle>, is_deleted: bool) -> Vec<ResumeKey> {
        let mut removals = Vec::new();
        for mut stream in obj.streams.drain(..) {
            if stream.handle.is_some() {
                self.poll_stream(&mut stream, &obj.name);
                self.persist_stream(&mut stream, &obj.name);
            }
            if let Some(handle) = stream.handle.take() {
                self.reader.close(handle);
            }
            if is_deleted && self.config.monitor(stream.monitor).delete_state_on_delete {
                removals.push(stream.key);
            }
        }
        removals
    }
}

/// Owns the pattern tree, the live objects and the watch index.
pub struct Reconciler<R: StreamReader> {
    tree: PatternTree,
    live: Vec<Vec<ActiveObject<R::Handle>>>,
    index: WatchIndex<WatchHandle, (EdgeId, ObjectId)>,
    backend: Box<dyn ChangeBackend>,
    io: StreamIo<R>,
    cancel: CancellationToken,
    next_object: u64,
    pending_removals: Vec<ResumeKey>,
    had_data: bool,
}

impl<R: StreamReader> Reconciler<R> {
    /// Create a reconciler. Nothing is touched on disk until the first walk.
    pub fn new(
        config: Config,
        tree: PatternTree,
        backend: Box<dyn ChangeBackend>,
        reader: R,
        sink: Box<dyn RecordSink>,
        stats: Arc<WatcherStats>,
        cancel: CancellationToken,
    ) -> Self {
        let live = (0..tree.edge_count()).map(|_| Vec::new()).collect();
        let engine = Self {
            tree,
            live,
            index: WatchIndex::new(),
            backend,
            io: StreamIo {
                config,
                reader,
                sink,
                stats,
            },
            cancel,
            next_object: 1,
            pending_removals: Vec::new(),
            had_data: false,
        };
        engine.warn_missing_literals();
        engine
    }

    fn warn_missing_literals(&self) {
        for monitor in &self.io.config.monitors {
            if monitor.file_not_found_error
                && !monitor.has_wildcard()
                && !Path::new(&monitor.file).exists()
            {
                tracing::warn!(
                    file = %monitor.file,
                    "Monitored file does not exist (yet), it will be picked up once it appears"
                );
            }
        }
    }

    /// Walk the whole tree. Returns whether any stream read data.
    pub fn walk(&mut self) -> bool {
        self.had_data = false;
        WatcherStats::incr(&self.io.stats.walks);
        self.walk_node(PatternTree::ROOT);
        self.finish_walk();
        self.had_data
    }

    /// Handle one backend event.
    pub fn on_event(&mut self, event: &RawEvent) {
        self.dispatch(event);
        self.finish_walk();
    }

    /// Handle a batch of events, stopping early on cancellation.
    pub fn on_events(&mut self, events: &[RawEvent]) {
        for event in events {
            if self.cancel.is_cancelled() {
                break;
            }
            self.dispatch(event);
        }
        self.finish_walk();
    }

    fn dispatch(&mut self, event: &RawEvent) {
        if event.kind == EventKind::Rescan {
            tracing::warn!("Change events were lost, rescanning all patterns");
            WatcherStats::incr(&self.io.stats.walks);
            self.walk_node(PatternTree::ROOT);
            return;
        }

        let Some(handle) = event.handle else {
            return;
        };
        let Some(&(edge_id, object)) = self.index.lookup(&handle) else {
            tracing::debug!(%handle, kind = ?event.kind, "Event for unknown watch, ignoring");
            return;
        };

        let edge = self.tree.edge(edge_id);
        if event.kind.is_structural() && !edge.is_file() {
            tracing::trace!(%handle, name = ?event.name, kind = ?event.kind, "Directory changed");
            if let Some(child) = edge.child() {
                self.walk_node(child);
            }
        } else if event.kind == EventKind::Modified && edge.is_file() {
            let live = &mut self.live[edge_id.index()];
            if let Some(obj) = live.iter_mut().find(|o| o.id == object) {
                self.io.poll_object(obj);
            }
        }
    }

    /// Force a poll of every stream whose read timeout has expired.
    pub fn poll_timeouts(&mut self, now: Instant) {
        for edge in self.tree.edge_ids() {
            if !self.tree.edge(edge).is_file() {
                continue;
            }
            for obj in &mut self.live[edge.index()] {
                for stream in &mut obj.streams {
                    let Some(timeout) = self.io.config.monitor(stream.monitor).read_timeout()
                    else {
                        continue;
                    };
                    if now.saturating_duration_since(stream.last_activity) >= timeout {
                        tracing::debug!(path = %obj.name.display(), "Read timeout expired, polling");
                        self.io.poll_stream(stream, &obj.name);
                        stream.last_activity = now;
                    }
                }
            }
        }
    }

    /// Tear down every object without deleting state.
    pub fn shutdown(&mut self) {
        for edge in self.tree.edge_ids() {
            let objects = std::mem::take(&mut self.live[edge.index()]);
            for obj in objects {
                self.destroy(obj, false);
            }
        }
        self.finish_walk();
        tracing::info!("All monitored objects closed");
    }

    fn walk_node(&mut self, node: NodeId) {
        let edges = self.tree.node(node).edges().to_vec();
        for edge in edges {
            if self.cancel.is_cancelled() {
                return;
            }
            self.detect_updates(edge);
            self.discover(edge);
            self.poll_active(edge);
            if let Some(child) = self.tree.edge(edge).child() {
                self.walk_node(child);
            }
        }
    }

    fn detect_updates(&mut self, edge: EdgeId) {
        let is_file = self.tree.edge(edge).is_file();
        let event_driven = self.backend.is_event_driven();
        let mut i = 0;
        while i < self.live[edge.index()].len() {
            let obj = &mut self.live[edge.index()][i];
            let gone = match std::fs::metadata(&obj.name) {
                Err(e) => {
                    tracing::debug!(path = %obj.name.display(), "Object gone: {e}");
                    true
                }
                Ok(meta) if file_identity(&meta) != (obj.ino, obj.dev) => {
                    tracing::debug!(path = %obj.name.display(), "Object replaced by a new inode");
                    true
                }
                Ok(_) => false,
            };
            if gone {
                let obj = self.live[edge.index()].remove(i);
                self.destroy(obj, true);
                continue;
            }
            if event_driven && obj.watch.is_none() {
                register_watch(
                    self.backend.as_mut(),
                    &mut self.index,
                    &self.io.stats,
                    obj,
                    is_file,
                );
            }
            i += 1;
        }
    }

    fn discover(&mut self, edge: EdgeId) {
        let pattern = self.tree.edge(edge).path().to_string();
        let is_file = self.tree.edge(edge).is_file();

        let paths = match glob::glob_with(&pattern, GLOB_OPTIONS) {
            Ok(paths) => paths,
            Err(e) => {
                tracing::debug!(pattern = %pattern, "Pattern can never match: {e}");
                return;
            }
        };
        let mut found: Vec<PathBuf> = paths
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::debug!(pattern = %pattern, "Cannot read while expanding: {e}");
                    None
                }
            })
            .collect();
        found.sort();

        for path in found {
            if self.cancel.is_cancelled() {
                return;
            }
            let meta = match std::fs::metadata(&path) {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::debug!(path = %path.display(), "Cannot stat, ignored: {e}");
                    continue;
                }
            };
            let found_file = meta.is_file();
            if !found_file && !meta.is_dir() {
                tracing::warn!(
                    path = %path.display(),
                    "Neither a regular file nor a directory, ignored"
                );
                continue;
            }
            if found_file != is_file {
                tracing::warn!(
                    path = %path.display(),
                    found = if found_file { "file" } else { "directory" },
                    expected = if is_file { "file" } else { "directory" },
                    "Unexpected object type, ignored"
                );
                continue;
            }
            if self.live[edge.index()].iter().any(|o| o.name == path) {
                continue;
            }
            self.create(edge, path, &meta);
        }
    }

    fn poll_active(&mut self, edge: EdgeId) {
        if self.backend.is_event_driven() || !self.tree.edge(edge).is_file() {
            return;
        }
        for obj in &mut self.live[edge.index()] {
            if self.cancel.is_cancelled() {
                return;
            }
            self.had_data |= self.io.poll_object(obj);
        }
    }

    fn create(&mut self, edge: EdgeId, name: PathBuf, meta: &Metadata) {
        let (ino, dev) = file_identity(meta);
        let id = ObjectId(self.next_object);
        self.next_object += 1;

        let is_file = self.tree.edge(edge).is_file();
        let mut obj = ActiveObject {
            id,
            name,
            edge,
            ino,
            dev,
            watch: None,
            streams: Vec::new(),
        };

        if self.backend.is_event_driven() {
            register_watch(
                self.backend.as_mut(),
                &mut self.index,
                &self.io.stats,
                &mut obj,
                is_file,
            );
        }

        if is_file {
            for &monitor in self.tree.edge(edge).instances() {
                let config = self.io.config.monitor(monitor);
                let mut stream = InstanceStream::new(monitor, config, ino, &obj.name);
                self.io.open_stream(&mut stream, &obj.name);
                obj.streams.push(stream);
            }
        }

        tracing::info!(
            path = %obj.name.display(),
            ino,
            streams = obj.streams.len(),
            watch = ?obj.watch,
            "Monitoring object"
        );
        WatcherStats::incr(&self.io.stats.objects_created);

        if is_file {
            self.had_data |= self.io.poll_object(&mut obj);
        }
        self.live[edge.index()].push(obj);
    }

    fn destroy(&mut self, mut obj: ActiveObject<R::Handle>, is_deleted: bool) {
        let removals = self.io.close_object(&mut obj, is_deleted);
        self.pending_removals.extend(removals);

        if let Some(handle) = obj.watch.take() {
            self.index.remove(&handle);
            self.backend.remove_watch(handle);
        }

        WatcherStats::incr(&self.io.stats.objects_removed);
        tracing::info!(path = %obj.name.display(), is_deleted, "Stopped monitoring object");
    }

    /// Remove state scheduled during the walk, unless a live stream has
    /// picked the key up again (a rename seen as delete plus create).
    fn finish_walk(&mut self) {
        if self.pending_removals.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending_removals);
        for key in pending {
            let reopened = self
                .live
                .iter()
                .flatten()
                .flat_map(|o| o.streams.iter())
                .any(|s| s.key == key);
            if reopened {
                tracing::debug!(%key, "Resume state picked up again, keeping it");
                continue;
            }
            if let Err(e) = self.io.reader.remove_state(&key) {
                tracing::error!(%key, "Failed to remove resume state: {e}");
                WatcherStats::incr(&self.io.stats.errors);
            }
        }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.io.config
    }

    /// The pattern tree.
    #[must_use]
    pub fn tree(&self) -> &PatternTree {
        &self.tree
    }

    /// The change backend.
    #[must_use]
    pub fn backend(&self) -> &dyn ChangeBackend {
        self.backend.as_ref()
    }

    /// Mutable access to the change backend, for the worker's wait.
    pub fn backend_mut(&mut self) -> &mut dyn ChangeBackend {
        self.backend.as_mut()
    }

    /// The stream reader.
    #[must_use]
    pub fn reader(&self) -> &R {
        &self.io.reader
    }

    /// Shared statistics.
    #[must_use]
    pub fn stats(&self) -> Arc<WatcherStats> {
        Arc::clone(&self.io.stats)
    }

    /// Objects currently matched on `edge`.
    #[must_use]
    pub fn objects(&self, edge: EdgeId) -> &[ActiveObject<R::Handle>] {
        &self.live[edge.index()]
    }

    /// Names of all live objects, sorted.
    #[must_use]
    pub fn object_names(&self) -> Vec<PathBuf> {
        let mut names: Vec<PathBuf> = self
            .live
            .iter()
            .flatten()
            .map(|o| o.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Number of registered watches.
    #[must_use]
    pub fn watch_count(&self) -> usize {
        self.index.len()
    }
}

fn register_watch<H>(
    backend: &mut dyn ChangeBackend,
    index: &mut WatchIndex<WatchHandle, (EdgeId, ObjectId)>,
    stats: &WatcherStats,
    obj: &mut ActiveObject<H>,
    is_file: bool,
) {
    let interest = if is_file {
        WatchInterest::File
    } else {
        WatchInterest::Directory
    };
    match backend.add_watch(&obj.name, interest) {
        Ok(Some(handle)) => {
            if index.add(handle, (obj.edge, obj.id)) {
                obj.watch = Some(handle);
            }
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(path = %obj.name.display(), "Cannot watch object, will retry: {e}");
            WatcherStats::incr(&stats.watch_failures);
        }
    }
}

impl<R: StreamReader> std::fmt::Debug for Reconciler<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("backend", &self.backend.name())
            .field("edges", &self.tree.edge_count())
            .field("objects", &self.live.iter().map(Vec::len).sum::<usize>())
            .field("watches", &self.index.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
