//! Configuration management for filetail.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables
//! - TOML configuration file (lowest priority)

mod monitor;
mod settings;

pub use monitor::{MonitorConfig, MonitorId};
pub use settings::{Config, WatchMode};
