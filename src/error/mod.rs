//! Error types and Result aliases for filetail.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use thiserror::Error;

/// Result type alias using filetail's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for filetail operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Resume-state storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Change-detection backend error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// Stream reader error.
    #[error("reader error: {0}")]
    Reader(#[from] ReaderError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// `SQLite` database error.
    #[error("database error: {0}")]
    Database(String),

    /// Record not found.
    #[error("not found: {entity} with key '{key}'")]
    NotFound { entity: &'static str, key: String },

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

/// Change-detection backend errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Backend could not be initialized.
    #[error("failed to initialize {backend} backend: {reason}")]
    Init {
        backend: &'static str,
        reason: String,
    },

    /// Failed to watch path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },

    /// Event channel closed or broken.
    #[error("event channel error: {0}")]
    Channel(String),
}

/// Stream reader errors.
#[derive(Error, Debug)]
pub enum ReaderError {
    /// The file to tail could not be opened.
    #[error("failed to open '{path}': {reason}")]
    Open { path: String, reason: String },

    /// Reading from an open stream failed.
    #[error("failed to read '{path}': {reason}")]
    Read { path: String, reason: String },

    /// Downstream record sink refused a batch.
    #[error("record sink closed")]
    SinkClosed,
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl StorageError {
    /// Create a not-found error.
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }
}

impl WatcherError {
    /// Create a watch-failed error for a path.
    pub fn watch_failed(path: &std::path::Path, reason: impl ToString) -> Self {
        Self::WatchFailed {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}
