//! Pattern matching and filesystem reconciliation.
//!
//! This module provides:
//! - The pattern tree built once from the configured monitors
//! - The reconciler that keeps live objects in step with the filesystem
//! - Polling and native change-notification backends
//! - The worker thread that drives it all

mod active;
mod backend;
mod engine;
mod events;
mod index;
mod native;
mod stats;
mod tree;
mod worker;

pub use active::{ActiveObject, InstanceStream, ObjectId};
pub use backend::{create_backend, ChangeBackend, PollBackend};
pub use engine::Reconciler;
pub use events::{EventBatch, EventKind, RawEvent, WatchHandle, WatchInterest};
pub use index::WatchIndex;
pub use native::NotifyBackend;
pub use stats::{WatcherStats, WatcherStatsSnapshot};
pub use tree::{EdgeId, NodeId, PatternEdge, PatternNode, PatternTree};
pub use worker::{Worker, WorkerHandle};
