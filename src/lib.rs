//! filetail
//!
//! Pattern-driven file tailing. Configured path patterns (plain paths or
//! shell wildcards) are decomposed into a shared tree; a single worker keeps
//! the set of matched files in step with the filesystem, using either stat
//! polling or native change notification, and reads each file from where it
//! last stopped.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod observability;
pub mod reader;
pub mod storage;
pub mod watcher;

pub use config::Config;
pub use error::{Error, Result};
