use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use super::Reconciler;
use crate::config::{Config, MonitorConfig, MonitorId};
use crate::error::{ReaderError, StorageError, WatcherError};
use crate::reader::{
    FileStreamReader, LogRecord, OpenOptions, PollOutcome, ResumeKey, SharedSink, StreamReader,
};
use crate::storage::{self, Database};
use crate::watcher::backend::{ChangeBackend, PollBackend};
use crate::watcher::events::{EventKind, RawEvent, WatchHandle, WatchInterest};
use crate::watcher::stats::WatcherStats;
use crate::watcher::tree::PatternTree;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Open(PathBuf, ResumeKey),
    Poll(PathBuf),
    Persist(ResumeKey),
    Close(PathBuf),
    Remove(ResumeKey),
}

/// Reader that records every call and never produces data.
#[derive(Debug, Default)]
struct CountingReader {
    calls: Vec<Call>,
    fail_persist: bool,
}

impl CountingReader {
    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    fn opens_of(&self, path: &Path) -> Vec<ResumeKey> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Open(p, k) if p == path => Some(k.clone()),
                _ => None,
            })
            .collect()
    }

    fn polls_of(&self, path: &Path) -> usize {
        self.count(|c| matches!(c, Call::Poll(p) if p == path))
    }
}

impl StreamReader for CountingReader {
    type Handle = (PathBuf, ResumeKey);

    fn open(&mut self, key: &ResumeKey, path: &Path, _options: OpenOptions) -> Result<Self::Handle> {
        if !path.exists() {
            return Err(ReaderError::Open {
                path: path.display().to_string(),
                reason: "missing".to_string(),
            }
            .into());
        }
        self.calls.push(Call::Open(path.to_path_buf(), key.clone()));
        Ok((path.to_path_buf(), key.clone()))
    }

    fn poll(
        &mut self,
        handle: &mut Self::Handle,
        _max_lines: usize,
        _emit: &mut dyn FnMut(String, u64),
    ) -> Result<PollOutcome> {
        self.calls.push(Call::Poll(handle.0.clone()));
        Ok(PollOutcome::default())
    }

    fn persist(&mut self, _handle: &Self::Handle, key: &ResumeKey) -> Result<()> {
        self.calls.push(Call::Persist(key.clone()));
        if self.fail_persist {
            return Err(StorageError::Database("disk full".to_string()).into());
        }
        Ok(())
    }

    fn close(&mut self, handle: Self::Handle) {
        self.calls.push(Call::Close(handle.0));
    }

    fn remove_state(&mut self, key: &ResumeKey) -> Result<()> {
        self.calls.push(Call::Remove(key.clone()));
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Script {
    next: u64,
    watches: Vec<(WatchHandle, PathBuf, WatchInterest)>,
    failing: HashSet<PathBuf>,
}

impl Script {
    fn handle_of(&self, path: &Path) -> Option<WatchHandle> {
        self.watches
            .iter()
            .find(|(_, p, _)| p == path)
            .map(|(h, _, _)| *h)
    }
}

/// Event-driven backend whose watches are inspected and failed by the test.
struct ScriptedBackend(Arc<Mutex<Script>>);

impl ChangeBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn is_event_driven(&self) -> bool {
        true
    }

    fn add_watch(&mut self, path: &Path, interest: WatchInterest) -> Result<Option<WatchHandle>> {
        let mut script = self.0.lock();
        if script.failing.contains(path) {
            return Err(WatcherError::watch_failed(path, "scripted failure").into());
        }
        script.next += 1;
        let handle = WatchHandle(script.next);
        script.watches.push((handle, path.to_path_buf(), interest));
        Ok(Some(handle))
    }

    fn remove_watch(&mut self, handle: WatchHandle) {
        self.0.lock().watches.retain(|(h, _, _)| *h != handle);
    }

    fn wait(&mut self, _timeout: Duration) -> Result<Vec<RawEvent>> {
        Ok(Vec::new())
    }
}

fn config_for(monitors: Vec<MonitorConfig>) -> Config {
    Config {
        monitors,
        ..Config::default()
    }
}

fn pattern(dir: &Path, name: &str) -> String {
    format!("{}/{name}", dir.display())
}

fn touch(path: &Path) {
    std::fs::write(path, "").unwrap();
}

fn polling<R: StreamReader>(config: Config, reader: R) -> Reconciler<R> {
    let tree = PatternTree::from_config(&config);
    let cancel = CancellationToken::new();
    Reconciler::new(
        config,
        tree,
        Box::new(PollBackend::new(cancel.clone())),
        reader,
        Box::new(Vec::<LogRecord>::new()),
        WatcherStats::new(),
        cancel,
    )
}

fn scripted(config: Config) -> (Reconciler<CountingReader>, Arc<Mutex<Script>>) {
    let script = Arc::new(Mutex::new(Script::default()));
    let tree = PatternTree::from_config(&config);
    let engine = Reconciler::new(
        config,
        tree,
        Box::new(ScriptedBackend(Arc::clone(&script))),
        CountingReader::default(),
        Box::new(Vec::<LogRecord>::new()),
        WatcherStats::new(),
        CancellationToken::new(),
    );
    (engine, script)
}

fn file_objects<R: StreamReader>(engine: &Reconciler<R>, pattern: &str) -> Vec<PathBuf> {
    let edge = engine.tree().find_edge(pattern).unwrap();
    let mut names: Vec<PathBuf> = engine
        .objects(edge)
        .iter()
        .map(|o| o.name().to_path_buf())
        .collect();
    names.sort();
    names
}

#[test]
fn test_walk_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    touch(&tmp.path().join("a.log"));
    touch(&tmp.path().join("b.log"));
    let pat = pattern(tmp.path(), "*.log");

    let mut engine = polling(config_for(vec![MonitorConfig::new(&pat, "t")]), CountingReader::default());
    engine.walk();
    let first = engine.object_names();
    engine.walk();

    assert_eq!(engine.object_names(), first);
    assert_eq!(file_objects(&engine, &pat).len(), 2);
    assert_eq!(engine.reader().count(|c| matches!(c, Call::Open(..))), 2);
}

#[test]
fn test_discovers_new_file_once() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.log");
    touch(&a);
    let pat = pattern(tmp.path(), "*.log");

    let mut engine = polling(config_for(vec![MonitorConfig::new(&pat, "t")]), CountingReader::default());
    engine.walk();
    assert_eq!(file_objects(&engine, &pat), vec![a.clone()]);

    let b = tmp.path().join("b.log");
    touch(&b);
    engine.walk();
    engine.walk();

    assert_eq!(file_objects(&engine, &pat), vec![a, b.clone()]);
    assert_eq!(engine.reader().opens_of(&b).len(), 1);
}

#[test]
fn test_creation_polls_immediately_and_each_walk() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.log");
    touch(&a);

    let mut engine = polling(
        config_for(vec![MonitorConfig::new(pattern(tmp.path(), "a.log"), "t")]),
        CountingReader::default(),
    );
    engine.walk();
    // creation poll + walk poll
    assert_eq!(engine.reader().polls_of(&a), 2);
    engine.walk();
    assert_eq!(engine.reader().polls_of(&a), 3);
}

#[test]
fn test_forgets_deleted_file_and_removes_state() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.log");
    let b = tmp.path().join("b.log");
    touch(&a);
    touch(&b);
    let pat = pattern(tmp.path(), "*.log");

    let mut engine = polling(config_for(vec![MonitorConfig::new(&pat, "t")]), CountingReader::default());
    engine.walk();
    let key = engine.reader().opens_of(&a)[0].clone();

    std::fs::remove_file(&a).unwrap();
    engine.walk();

    assert_eq!(file_objects(&engine, &pat), vec![b]);
    let reader = engine.reader();
    assert_eq!(reader.count(|c| *c == Call::Persist(key.clone())), 1);
    assert_eq!(reader.count(|c| *c == Call::Remove(key.clone())), 1);
    assert_eq!(reader.count(|c| *c == Call::Close(a.clone())), 1);

    let persist_at = reader.calls.iter().position(|c| *c == Call::Persist(key.clone()));
    let remove_at = reader.calls.iter().position(|c| *c == Call::Remove(key.clone()));
    assert!(persist_at < remove_at);
}

#[test]
fn test_forget_keeps_state_when_configured() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.log");
    touch(&a);
    let mut monitor = MonitorConfig::new(pattern(tmp.path(), "*.log"), "t");
    monitor.delete_state_on_delete = false;

    let mut engine = polling(config_for(vec![monitor]), CountingReader::default());
    engine.walk();
    std::fs::remove_file(&a).unwrap();
    engine.walk();

    assert!(engine.object_names().iter().all(|n| n != &a));
    assert_eq!(engine.reader().count(|c| matches!(c, Call::Persist(_))), 1);
    assert_eq!(engine.reader().count(|c| matches!(c, Call::Remove(_))), 0);
}

#[test]
fn test_persist_failure_still_destroys_object() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.log");
    let b = tmp.path().join("b.log");
    touch(&a);
    touch(&b);
    let pat = pattern(tmp.path(), "*.log");
    let reader = CountingReader {
        fail_persist: true,
        ..CountingReader::default()
    };

    let mut engine = polling(config_for(vec![MonitorConfig::new(&pat, "t")]), reader);
    engine.walk();
    std::fs::remove_file(&a).unwrap();
    engine.walk();

    let names = engine.object_names();
    assert!(!names.contains(&a));
    assert!(names.contains(&b));
    assert_eq!(file_objects(&engine, &pat), vec![b]);
    assert_eq!(engine.reader().count(|c| *c == Call::Close(a.clone())), 1);
    assert!(engine.reader().count(|c| matches!(c, Call::Persist(_))) >= 1);
    assert!(engine.stats().snapshot().errors >= 1);
}

#[test]
fn test_shared_edge_fans_out() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("app.log");
    touch(&a);
    let pat = pattern(tmp.path(), "app.log");

    let mut engine = polling(
        config_for(vec![MonitorConfig::new(&pat, "one"), MonitorConfig::new(&pat, "two")]),
        CountingReader::default(),
    );

    let edge = engine.tree().find_edge(&pat).unwrap();
    assert_eq!(
        engine.tree().edge(edge).instances(),
        &[MonitorId(0), MonitorId(1)]
    );

    engine.walk();
    let keys = engine.reader().opens_of(&a);
    assert_eq!(keys.len(), 2);
    assert_ne!(keys[0], keys[1]);
    assert_eq!(engine.objects(edge).len(), 1);
    assert_eq!(engine.objects(edge)[0].streams().len(), 2);

    let before = engine.reader().polls_of(&a);
    engine.walk();
    assert_eq!(engine.reader().polls_of(&a) - before, 2);
}

#[test]
fn test_type_mismatch_is_skipped() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir(tmp.path().join("sub.log")).unwrap();
    touch(&tmp.path().join("real.log"));
    let pat = pattern(tmp.path(), "*.log");

    let mut engine = polling(config_for(vec![MonitorConfig::new(&pat, "t")]), CountingReader::default());
    engine.walk();
    assert_eq!(file_objects(&engine, &pat), vec![tmp.path().join("real.log")]);
}

#[test]
fn test_wildcard_directory_level() {
    let tmp = TempDir::new().unwrap();
    for dir in ["one", "two"] {
        std::fs::create_dir(tmp.path().join(dir)).unwrap();
        touch(&tmp.path().join(dir).join("app.log"));
    }
    let pat = format!("{}/*/app.log", tmp.path().display());

    let mut engine = polling(config_for(vec![MonitorConfig::new(&pat, "t")]), CountingReader::default());
    engine.walk();
    assert_eq!(file_objects(&engine, &pat).len(), 2);
    assert_eq!(
        file_objects(&engine, &pattern(tmp.path(), "*")),
        vec![tmp.path().join("one"), tmp.path().join("two")]
    );

    std::fs::remove_dir_all(tmp.path().join("one")).unwrap();
    engine.walk();
    assert_eq!(file_objects(&engine, &pat), vec![tmp.path().join("two/app.log")]);
}

#[test]
fn test_replaced_inode_is_a_new_object() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.log");
    std::fs::write(&a, "x\n").unwrap();
    let pat = pattern(tmp.path(), "a.log");

    let mut engine = polling(config_for(vec![MonitorConfig::new(&pat, "t")]), CountingReader::default());
    engine.walk();
    let edge = engine.tree().find_edge(&pat).unwrap();
    let first = engine.objects(edge)[0].id();

    // Keep the old inode alive so the new file cannot reuse its number.
    let rotated = tmp.path().join("a.log.1");
    std::fs::rename(&a, &rotated).unwrap();
    std::fs::write(&a, "y\n").unwrap();
    engine.walk();

    assert_eq!(engine.objects(edge).len(), 1);
    assert_ne!(engine.objects(edge)[0].id(), first);
    assert_eq!(engine.reader().opens_of(&a).len(), 2);
}

#[test]
fn test_shutdown_closes_without_removing_state() {
    let tmp = TempDir::new().unwrap();
    touch(&tmp.path().join("a.log"));
    touch(&tmp.path().join("b.log"));

    let mut engine = polling(
        config_for(vec![MonitorConfig::new(pattern(tmp.path(), "*.log"), "t")]),
        CountingReader::default(),
    );
    engine.walk();
    engine.shutdown();

    assert!(engine.object_names().is_empty());
    let reader = engine.reader();
    assert_eq!(reader.count(|c| matches!(c, Call::Persist(_))), 2);
    assert_eq!(reader.count(|c| matches!(c, Call::Close(_))), 2);
    assert_eq!(reader.count(|c| matches!(c, Call::Remove(_))), 0);
    assert_eq!(engine.stats().snapshot().objects_removed, engine.stats().snapshot().objects_created);
}

#[test]
fn test_cancelled_walk_does_nothing() {
    let tmp = TempDir::new().unwrap();
    touch(&tmp.path().join("a.log"));
    let config = config_for(vec![MonitorConfig::new(pattern(tmp.path(), "*.log"), "t")]);
    let tree = PatternTree::from_config(&config);
    let cancel = CancellationToken::new();
    let mut engine = Reconciler::new(
        config,
        tree,
        Box::new(PollBackend::new(cancel.clone())),
        CountingReader::default(),
        Box::new(Vec::<LogRecord>::new()),
        WatcherStats::new(),
        cancel.clone(),
    );

    cancel.cancel();
    engine.walk();
    assert!(engine.object_names().is_empty());
}

#[test]
fn test_event_mode_registers_watches() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.log");
    touch(&a);

    let (mut engine, script) = scripted(config_for(vec![MonitorConfig::new(
        pattern(tmp.path(), "*.log"),
        "t",
    )]));
    engine.walk();

    let script = script.lock();
    assert_eq!(engine.watch_count(), script.watches.len());
    assert_eq!(engine.watch_count(), engine.object_names().len());
    let (_, _, interest) = script
        .watches
        .iter()
        .find(|(_, p, _)| p == &a)
        .unwrap();
    assert_eq!(*interest, WatchInterest::File);
    let (_, _, interest) = script
        .watches
        .iter()
        .find(|(_, p, _)| p == tmp.path())
        .unwrap();
    assert_eq!(*interest, WatchInterest::Directory);
}

#[test]
fn test_event_mode_does_not_poll_on_walk() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.log");
    touch(&a);

    let (mut engine, _script) = scripted(config_for(vec![MonitorConfig::new(
        pattern(tmp.path(), "*.log"),
        "t",
    )]));
    engine.walk();
    engine.walk();
    // only the creation poll
    assert_eq!(engine.reader().polls_of(&a), 1);
}

#[test]
fn test_modify_event_polls_file() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.log");
    touch(&a);

    let (mut engine, script) = scripted(config_for(vec![MonitorConfig::new(
        pattern(tmp.path(), "*.log"),
        "t",
    )]));
    engine.walk();
    let handle = script.lock().handle_of(&a).unwrap();

    engine.on_event(&RawEvent::new(handle, EventKind::Modified, None));
    assert_eq!(engine.reader().polls_of(&a), 2);
}

#[test]
fn test_unknown_handle_is_ignored() {
    let tmp = TempDir::new().unwrap();
    touch(&tmp.path().join("a.log"));

    let (mut engine, _script) = scripted(config_for(vec![MonitorConfig::new(
        pattern(tmp.path(), "*.log"),
        "t",
    )]));
    engine.walk();
    let calls = engine.reader().calls.len();

    engine.on_event(&RawEvent::new(WatchHandle(9999), EventKind::Created, None));
    engine.on_event(&RawEvent::new(WatchHandle(9999), EventKind::Modified, None));
    assert_eq!(engine.reader().calls.len(), calls);
}

#[test]
fn test_directory_event_discovers_and_forgets() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.log");
    touch(&a);
    let pat = pattern(tmp.path(), "*.log");

    let (mut engine, script) = scripted(config_for(vec![MonitorConfig::new(&pat, "t")]));
    engine.walk();
    let dir_handle = script.lock().handle_of(tmp.path()).unwrap();

    let b = tmp.path().join("b.log");
    touch(&b);
    engine.on_event(&RawEvent::new(dir_handle, EventKind::Created, Some("b.log".into())));
    assert_eq!(file_objects(&engine, &pat), vec![a.clone(), b.clone()]);
    assert!(script.lock().handle_of(&b).is_some());

    std::fs::remove_file(&a).unwrap();
    engine.on_event(&RawEvent::new(dir_handle, EventKind::Deleted, Some("a.log".into())));
    assert_eq!(file_objects(&engine, &pat), vec![b]);
    assert!(script.lock().handle_of(&a).is_none());
    assert_eq!(engine.watch_count(), script.lock().watches.len());
}

#[test]
fn test_failed_watch_is_retried() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.log");
    touch(&a);

    let (mut engine, script) = scripted(config_for(vec![MonitorConfig::new(
        pattern(tmp.path(), "*.log"),
        "t",
    )]));
    script.lock().failing.insert(a.clone());

    engine.walk();
    assert_eq!(engine.object_names().iter().filter(|n| **n == a).count(), 1);
    assert!(script.lock().handle_of(&a).is_none());
    assert_eq!(engine.stats().snapshot().watch_failures, 1);

    script.lock().failing.clear();
    engine.walk();
    assert!(script.lock().handle_of(&a).is_some());
}

#[test]
fn test_rescan_event_walks_everything() {
    let tmp = TempDir::new().unwrap();
    let (mut engine, _script) = scripted(config_for(vec![MonitorConfig::new(
        pattern(tmp.path(), "*.log"),
        "t",
    )]));
    engine.walk();

    let a = tmp.path().join("a.log");
    touch(&a);
    engine.on_event(&RawEvent::rescan());
    assert!(engine.object_names().contains(&a));
}

#[test]
fn test_read_timeout_forces_poll() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.log");
    touch(&a);
    let mut monitor = MonitorConfig::new(pattern(tmp.path(), "*.log"), "t");
    monitor.read_timeout_secs = Some(1);

    let (mut engine, _script) = scripted(config_for(vec![monitor]));
    engine.walk();
    assert_eq!(engine.reader().polls_of(&a), 1);

    engine.poll_timeouts(Instant::now());
    assert_eq!(engine.reader().polls_of(&a), 1);

    let later = Instant::now() + Duration::from_secs(2);
    engine.poll_timeouts(later);
    assert_eq!(engine.reader().polls_of(&a), 2);
    engine.poll_timeouts(later);
    assert_eq!(engine.reader().polls_of(&a), 2);
}

fn file_reader() -> FileStreamReader {
    let db = Database::open_in_memory().unwrap();
    storage::init_storage(&db).unwrap();
    FileStreamReader::new(db)
}

fn polling_with_sink(config: Config, sink: SharedSink) -> Reconciler<FileStreamReader> {
    let tree = PatternTree::from_config(&config);
    let cancel = CancellationToken::new();
    Reconciler::new(
        config,
        tree,
        Box::new(PollBackend::new(cancel.clone())),
        file_reader(),
        Box::new(sink),
        WatcherStats::new(),
        cancel,
    )
}

#[test]
fn test_lines_reach_the_sink_with_tag() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.log");
    std::fs::write(&a, "hello\nworld\n").unwrap();

    let sink = SharedSink::default();
    let mut engine = polling_with_sink(
        config_for(vec![MonitorConfig::new(pattern(tmp.path(), "*.log"), "app")]),
        Arc::clone(&sink),
    );
    assert!(engine.walk());
    assert!(!engine.walk());

    let records = sink.lock();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].tag, "app");
    assert_eq!(records[0].path, a);
    assert_eq!(records[1].message, "world");
    assert_eq!(records[1].offset, 6);
}

#[test]
fn test_rename_resumes_position() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.log");
    std::fs::write(&a, "one\ntwo\n").unwrap();

    let sink = SharedSink::default();
    let mut engine = polling_with_sink(
        config_for(vec![MonitorConfig::new(pattern(tmp.path(), "*.log"), "t")]),
        Arc::clone(&sink),
    );
    engine.walk();
    assert_eq!(sink.lock().len(), 2);

    let b = tmp.path().join("b.log");
    std::fs::rename(&a, &b).unwrap();
    let mut f = std::fs::OpenOptions::new().append(true).open(&b).unwrap();
    std::io::Write::write_all(&mut f, b"three\n").unwrap();
    drop(f);

    engine.walk();
    let messages: Vec<String> = sink.lock().iter().map(|r| r.message.clone()).collect();
    assert_eq!(messages, vec!["one", "two", "three"]);
    assert_eq!(file_objects(&engine, &pattern(tmp.path(), "*.log")), vec![b]);

    // The old name's state removal is skipped because the new name holds the key.
    let count = engine
        .reader()
        .database()
        .with_conn(storage::count_resume_states)
        .unwrap();
    assert_eq!(count, 1);

    std::fs::OpenOptions::new()
        .append(true)
        .open(tmp.path().join("b.log"))
        .and_then(|mut f| std::io::Write::write_all(&mut f, b"four\n"))
        .unwrap();
    engine.walk();
    assert_eq!(sink.lock().last().map(|r| r.message.as_str()), Some("four"));
}

#[test]
fn test_rate_limit_drops_excess() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.log");
    std::fs::write(&a, "1\n2\n3\n4\n").unwrap();
    let mut monitor = MonitorConfig::new(pattern(tmp.path(), "*.log"), "t");
    monitor.rate_limit_interval_secs = 60;
    monitor.rate_limit_burst = 3;

    let sink = SharedSink::default();
    let mut engine = polling_with_sink(config_for(vec![monitor]), Arc::clone(&sink));
    engine.walk();

    assert_eq!(sink.lock().len(), 3);
    assert_eq!(engine.stats().snapshot().lines_dropped, 1);
}

#[test]
fn test_persist_interval_writes_state_while_running() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.log");
    std::fs::write(&a, "1\n2\n").unwrap();
    let mut monitor = MonitorConfig::new(pattern(tmp.path(), "*.log"), "t");
    monitor.persist_state_interval = 1;

    let mut engine = polling_with_sink(config_for(vec![monitor]), SharedSink::default());
    engine.walk();

    let count = engine
        .reader()
        .database()
        .with_conn(storage::count_resume_states)
        .unwrap();
    assert_eq!(count, 1);
}
