//! filetail - pattern-driven file tailing
//!
//! Entry point for the filetail daemon.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use filetail::config::WatchMode;
use filetail::observability::{init_tracing, TracingConfig};
use filetail::reader::{FileStreamReader, LogRecord};
use filetail::storage::{init_storage, Database};
use filetail::watcher::{create_backend, PatternTree, Reconciler, WatcherStats, Worker};
use filetail::{Config, Error, Result};

/// Batches buffered between the worker and the printer.
const RECORD_QUEUE_DEPTH: usize = 64;

/// filetail - follow files matched by path patterns
#[derive(Parser, Debug)]
#[command(name = "filetail")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "FILETAIL_CONFIG", default_value = "filetail.toml")]
    config: PathBuf,

    /// Change detection mode (poll, notify)
    #[arg(short, long, env = "FILETAIL_MODE")]
    mode: Option<WatchMode>,

    /// Interval between walks in poll mode, in milliseconds
    #[arg(long, env = "FILETAIL_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    /// Directory holding the resume-state database
    #[arg(long, env = "FILETAIL_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "FILETAIL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging output
    #[arg(long, env = "FILETAIL_LOG_JSON")]
    log_json: bool,

    /// Walk once, read what is there, and exit
    #[arg(long)]
    once: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(dir) = &self.state_dir {
            config.state_dir.clone_from(dir);
        }
        if let Some(level) = &self.log_level {
            config.log_level.clone_from(level);
        }
    }
}

enum Signal {
    Shutdown,
    Reload,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::from_file(&cli.config)?;
    cli.apply(&mut config);
    Ok(config)
}

fn prepare_config(mut config: Config) -> Result<Config> {
    config.prepare()?;
    config.validate()?;
    Ok(config)
}

fn build_worker(
    config: Config,
    db: Database,
    records: mpsc::Sender<Vec<LogRecord>>,
    cancel: &CancellationToken,
) -> Worker<FileStreamReader> {
    let tree = PatternTree::from_config(&config);
    let backend = create_backend(config.mode, cancel);
    tracing::info!(
        mode = %config.mode,
        backend = backend.name(),
        monitors = config.monitors.len(),
        edges = tree.edge_count(),
        "Pattern tree built"
    );
    let engine = Reconciler::new(
        config,
        tree,
        backend,
        FileStreamReader::new(db),
        Box::new(records),
        WatcherStats::new(),
        cancel.clone(),
    );
    Worker::new(engine, cancel.clone())
}

async fn print_records(mut rx: mpsc::Receiver<Vec<LogRecord>>) {
    while let Some(batch) = rx.recv().await {
        let mut out = std::io::stdout().lock();
        for record in &batch {
            if let Err(e) = writeln!(out, "{} {}: {}", record.tag, record.path.display(), record.message) {
                tracing::error!("Failed to write record: {e}");
                return;
            }
        }
    }
}

/// Wait for SIGINT/SIGTERM (shutdown) or SIGHUP (reload).
#[cfg(unix)]
async fn wait_for_signal() -> Result<Signal> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            tracing::info!("Received Ctrl+C, initiating shutdown");
            Ok(Signal::Shutdown)
        }
        _ = terminate.recv() => {
            tracing::info!("Received SIGTERM, initiating shutdown");
            Ok(Signal::Shutdown)
        }
        _ = hangup.recv() => {
            tracing::info!("Received SIGHUP, reloading configuration");
            Ok(Signal::Reload)
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<Signal> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl+C, initiating shutdown");
    Ok(Signal::Shutdown)
}

async fn run_until_stopped(
    cli: &Cli,
    mut config: Config,
    db: &Database,
    records: &mpsc::Sender<Vec<LogRecord>>,
) -> Result<()> {
    loop {
        let cancel = CancellationToken::new();
        let worker = build_worker(config.clone(), db.clone(), records.clone(), &cancel);
        let handle = worker.spawn();

        let signal = wait_for_signal().await?;
        handle.stop().await?;

        match signal {
            Signal::Shutdown => return Ok(()),
            Signal::Reload => match load_config(cli).and_then(prepare_config) {
                Ok(reloaded) => {
                    tracing::info!(monitors = reloaded.monitors.len(), "Configuration reloaded");
                    config = reloaded;
                }
                Err(e) => {
                    tracing::error!("Reload failed, keeping the previous configuration: {e}");
                }
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    init_tracing(&TracingConfig {
        level: config.log_level.clone(),
        json: cli.log_json,
    });

    tracing::info!("filetail v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = prepare_config(config)?;
    tracing::debug!(?config, "Configuration loaded");

    let db = Database::open(config.database_path())?;
    init_storage(&db)?;

    let (tx, rx) = mpsc::channel(RECORD_QUEUE_DEPTH);
    let printer = tokio::spawn(print_records(rx));

    if cli.once {
        let cancel = CancellationToken::new();
        let worker = build_worker(config, db.clone(), tx.clone(), &cancel);
        tokio::task::spawn_blocking(move || worker.run_once())
            .await
            .map_err(|e| Error::internal(format!("watcher worker failed: {e}")))?;
    } else {
        run_until_stopped(&cli, config, &db, &tx).await?;
    }

    drop(tx);
    printer
        .await
        .map_err(|e| Error::internal(format!("record printer failed: {e}")))?;

    tracing::info!("filetail stopped");
    Ok(())
}
