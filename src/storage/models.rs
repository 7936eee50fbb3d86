//! Rows of the resume-state table.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix timestamp in seconds.
pub(crate) fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(0))
        .unwrap_or(0)
}

/// Saved read position of one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeState {
    /// Resume key (`filetail-state:<ino>:<namespace>`).
    pub key: String,

    /// Path the stream was last opened under.
    pub path: String,

    /// Inode number of the file.
    pub ino: u64,

    /// Byte offset of the first unread byte.
    pub offset: u64,

    /// Unix timestamp of the last write.
    pub updated_at: i64,
}

impl ResumeState {
    /// Create a state row stamped with the current time.
    #[must_use]
    pub fn new(key: impl Into<String>, path: impl Into<String>, ino: u64, offset: u64) -> Self {
        Self {
            key: key.into(),
            path: path.into(),
            ino,
            offset,
            updated_at: now_unix(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stamps_time() {
        let state = ResumeState::new("filetail-state:1:00", "/var/log/a.log", 1, 10);
        assert!(state.updated_at > 0);
        assert_eq!(state.offset, 10);
    }
}
