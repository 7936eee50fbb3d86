//! The single thread that drives a [`Reconciler`].
//!
//! Polling backends get a walk-and-sleep loop; event-driven backends get a
//! wait-and-dispatch loop. Both stop at the next cancellation check and then
//! tear every object down.

use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::engine::Reconciler;
use super::stats::WatcherStats;
use crate::error::Error;
use crate::reader::StreamReader;
use crate::Result;

/// Upper bound on back-to-back walks while files keep producing data.
const MAX_EAGER_WALKS: usize = 64;

/// Runs one reconciler until cancelled.
#[derive(Debug)]
pub struct Worker<R: StreamReader> {
    engine: Reconciler<R>,
    cancel: CancellationToken,
}

impl<R> Worker<R>
where
    R: StreamReader + Send + 'static,
    R::Handle: Send,
{
    /// Create a worker. `cancel` must be the token the reconciler checks.
    #[must_use]
    pub const fn new(engine: Reconciler<R>, cancel: CancellationToken) -> Self {
        Self { engine, cancel }
    }

    /// Run on the calling thread until cancelled, then tear down.
    ///
    /// Returns the reconciler so callers can inspect it after shutdown.
    pub fn run(mut self) -> Reconciler<R> {
        let backend = self.engine.backend().name();
        tracing::info!(backend, "Watcher worker started");

        if self.engine.backend().is_event_driven() {
            self.run_events();
        } else {
            self.run_polling();
        }

        self.engine.shutdown();
        self.engine.stats().snapshot().log();
        tracing::info!(backend, "Watcher worker stopped");
        self.engine
    }

    /// Walk once, tear down, and return.
    pub fn run_once(mut self) -> Reconciler<R> {
        self.engine.walk();
        self.engine.shutdown();
        self.engine.stats().snapshot().log();
        self.engine
    }

    /// Move the worker onto a blocking thread.
    pub fn spawn(self) -> WorkerHandle<R> {
        let cancel = self.cancel.clone();
        let join = tokio::task::spawn_blocking(move || self.run());
        WorkerHandle { cancel, join }
    }

    fn run_polling(&mut self) {
        let interval = self.engine.config().poll_interval;
        while !self.cancel.is_cancelled() {
            let mut walks = 0;
            while self.engine.walk() && !self.cancel.is_cancelled() {
                walks += 1;
                if walks >= MAX_EAGER_WALKS {
                    tracing::debug!(walks, "Files still busy, pausing before the next walk");
                    break;
                }
            }
            if self.cancel.is_cancelled() {
                break;
            }
            if let Err(e) = self.engine.backend_mut().wait(interval) {
                tracing::error!("Poll wait failed: {e}");
            }
        }
    }

    fn run_events(&mut self) {
        let granularity = self.engine.config().timeout_granularity;
        let check_timeouts = self.engine.config().has_read_timeouts();

        self.engine.walk();
        while !self.cancel.is_cancelled() {
            match self.engine.backend_mut().wait(granularity) {
                Ok(events) => {
                    if !events.is_empty() {
                        tracing::trace!(events = events.len(), "Change events received");
                        self.engine.on_events(&events);
                    }
                }
                Err(e) => {
                    tracing::error!("Change notification failed, rescanning: {e}");
                    WatcherStats::incr(&self.engine.stats().errors);
                    self.pause(granularity);
                    self.engine.walk();
                }
            }
            if check_timeouts && !self.cancel.is_cancelled() {
                self.engine.poll_timeouts(Instant::now());
            }
        }
    }

    fn pause(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while !self.cancel.is_cancelled() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(100)));
        }
    }
}

/// A worker running on a blocking thread.
#[derive(Debug)]
pub struct WorkerHandle<R: StreamReader> {
    cancel: CancellationToken,
    join: JoinHandle<Reconciler<R>>,
}

impl<R: StreamReader> WorkerHandle<R> {
    /// Whether the worker has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cancel the worker and wait for its teardown to complete.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread panicked.
    pub async fn stop(self) -> Result<Reconciler<R>> {
        self.cancel.cancel();
        self.join
            .await
            .map_err(|e| Error::internal(format!("watcher worker failed: {e}")))
    }
}
