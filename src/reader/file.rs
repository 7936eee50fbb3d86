//! Line-oriented file reader backed by the resume-state store.

use std::fs::{File, Metadata};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::{OpenOptions, PollOutcome, ResumeKey, StreamReader};
use crate::error::ReaderError;
use crate::storage::{self, Database, ResumeState};
use crate::Result;

/// `(inode, device)` of a file, `(0, 0)` where the platform has no inodes.
#[must_use]
pub fn file_identity(meta: &Metadata) -> (u64, u64) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        (meta.ino(), meta.dev())
    }
    #[cfg(not(unix))]
    {
        let _ = meta;
        (0, 0)
    }
}

/// An open file being tailed.
#[derive(Debug)]
pub struct FileHandle {
    path: PathBuf,
    reader: BufReader<File>,
    ino: u64,
    offset: u64,
    reopen_on_truncate: bool,
    line: Vec<u8>,
}

impl FileHandle {
    /// Current read position.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Path the file was opened under.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_error(&self, e: impl ToString) -> ReaderError {
        ReaderError::Read {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        }
    }

    fn seek_to(&mut self, offset: u64) -> Result<()> {
        self.reader
            .seek(SeekFrom::Start(offset))
            .map_err(|e| self.read_error(e))?;
        self.offset = offset;
        Ok(())
    }
}

/// Tails newline-terminated files, persisting positions in `SQLite`.
#[derive(Debug, Clone)]
pub struct FileStreamReader {
    db: Database,
}

impl FileStreamReader {
    /// Create a reader over an initialized state store.
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// The backing store.
    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }
}

impl StreamReader for FileStreamReader {
    type Handle = FileHandle;

    fn open(&mut self, key: &ResumeKey, path: &Path, options: OpenOptions) -> Result<FileHandle> {
        let open_error = |e: std::io::Error| ReaderError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        };
        let file = File::open(path).map_err(open_error)?;
        let meta = file.metadata().map_err(open_error)?;
        let (ino, _) = file_identity(&meta);
        let len = meta.len();

        let stored = self
            .db
            .with_conn(|conn| storage::get_resume_state(conn, key.as_str()))?;

        let offset = match stored {
            Some(state) if state.offset > len => {
                tracing::warn!(
                    path = %path.display(),
                    stored = state.offset,
                    size = len,
                    "File is smaller than the stored position, reading from the start"
                );
                0
            }
            Some(state) => state.offset,
            None if options.fresh_start_tail => len,
            None => 0,
        };

        let mut handle = FileHandle {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            ino,
            offset: 0,
            reopen_on_truncate: options.reopen_on_truncate,
            line: Vec::new(),
        };
        handle.seek_to(offset)?;

        tracing::debug!(path = %path.display(), %key, offset, "Opened stream");
        Ok(handle)
    }

    fn poll(
        &mut self,
        handle: &mut FileHandle,
        max_lines: usize,
        emit: &mut dyn FnMut(String, u64),
    ) -> Result<PollOutcome> {
        let len = handle
            .reader
            .get_ref()
            .metadata()
            .map_err(|e| handle.read_error(e))?
            .len();

        if len < handle.offset {
            if !handle.reopen_on_truncate {
                return Ok(PollOutcome {
                    lines: 0,
                    offset: handle.offset,
                });
            }
            tracing::warn!(
                path = %handle.path.display(),
                offset = handle.offset,
                size = len,
                "File was truncated, restarting at offset 0"
            );
            handle.seek_to(0)?;
        }

        let mut lines = 0;
        while max_lines == 0 || lines < max_lines {
            handle.line.clear();
            let n = handle
                .reader
                .read_until(b'\n', &mut handle.line)
                .map_err(|e| handle.read_error(e))?;
            if n == 0 {
                break;
            }
            if handle.line.last() != Some(&b'\n') {
                // Incomplete line: leave it for the next poll.
                let offset = handle.offset;
                handle.seek_to(offset)?;
                break;
            }

            let start = handle.offset;
            handle.offset += n as u64;

            let mut end = handle.line.len() - 1;
            if end > 0 && handle.line[end - 1] == b'\r' {
                end -= 1;
            }
            if end == 0 {
                continue;
            }

            emit(String::from_utf8_lossy(&handle.line[..end]).into_owned(), start);
            lines += 1;
        }

        Ok(PollOutcome {
            lines,
            offset: handle.offset,
        })
    }

    fn persist(&mut self, handle: &FileHandle, key: &ResumeKey) -> Result<()> {
        let state = ResumeState::new(
            key.as_str(),
            handle.path.display().to_string(),
            handle.ino,
            handle.offset,
        );
        self.db
            .with_conn(|conn| storage::upsert_resume_state(conn, &state))
    }

    fn close(&mut self, handle: FileHandle) {
        tracing::trace!(path = %handle.path.display(), offset = handle.offset, "Closed stream");
    }

    fn remove_state(&mut self, key: &ResumeKey) -> Result<()> {
        let removed = self
            .db
            .with_conn(|conn| storage::delete_resume_state(conn, key.as_str()))?;
        tracing::debug!(%key, removed, "Removed resume state");
        Ok(())
    }
}
