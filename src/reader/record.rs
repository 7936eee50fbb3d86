//! Records handed downstream and the batching in front of the sink.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::ReaderError;
use crate::Result;

/// One line read from a monitored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Tag of the monitor that read the line.
    pub tag: String,
    /// File the line came from.
    pub path: PathBuf,
    /// Byte offset the line started at.
    pub offset: u64,
    /// Line content without the terminator.
    pub message: String,
}

/// Downstream consumer of record batches.
pub trait RecordSink: Send {
    /// Hand over one batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the consumer is gone.
    fn submit(&mut self, records: Vec<LogRecord>) -> Result<()>;
}

/// Called from the blocking worker thread, never from inside the runtime.
impl RecordSink for mpsc::Sender<Vec<LogRecord>> {
    fn submit(&mut self, records: Vec<LogRecord>) -> Result<()> {
        self.blocking_send(records)
            .map_err(|_| ReaderError::SinkClosed.into())
    }
}

impl RecordSink for Vec<LogRecord> {
    fn submit(&mut self, records: Vec<LogRecord>) -> Result<()> {
        self.extend(records);
        Ok(())
    }
}

/// Collecting sink that can be inspected while a worker owns a clone.
pub type SharedSink = Arc<Mutex<Vec<LogRecord>>>;

impl RecordSink for SharedSink {
    fn submit(&mut self, records: Vec<LogRecord>) -> Result<()> {
        self.lock().extend(records);
        Ok(())
    }
}

/// Buffers records until `capacity` is reached.
#[derive(Debug)]
pub struct SubmitBatch {
    records: Vec<LogRecord>,
    capacity: usize,
}

impl SubmitBatch {
    /// Create an empty batch. A capacity of 0 is treated as 1.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Vec::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Add a record; returns the full batch once capacity is reached.
    pub fn push(&mut self, record: LogRecord) -> Option<Vec<LogRecord>> {
        self.records.push(record);
        (self.records.len() >= self.capacity).then(|| self.take())
    }

    /// Take whatever is buffered.
    pub fn take(&mut self) -> Vec<LogRecord> {
        std::mem::take(&mut self.records)
    }

    /// Number of buffered records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(n: u64) -> LogRecord {
        LogRecord {
            tag: "t".to_string(),
            path: PathBuf::from("/a.log"),
            offset: n,
            message: format!("line {n}"),
        }
    }

    #[test]
    fn test_batch_flushes_at_capacity() {
        let mut batch = SubmitBatch::new(2);
        assert!(batch.push(record(0)).is_none());
        let full = batch.push(record(1)).unwrap();
        assert_eq!(full.len(), 2);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_batch_take_partial() {
        let mut batch = SubmitBatch::new(10);
        batch.push(record(0));
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.take(), vec![record(0)]);
        assert!(batch.take().is_empty());
    }

    #[test]
    fn test_zero_capacity_flushes_every_record() {
        let mut batch = SubmitBatch::new(0);
        assert!(batch.push(record(0)).is_some());
    }

    #[test]
    fn test_shared_sink_collects() {
        let shared = SharedSink::default();
        let mut sink = Arc::clone(&shared);
        sink.submit(vec![record(0), record(1)]).unwrap();
        assert_eq!(shared.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_channel_sink_closed() {
        let (tx, rx) = mpsc::channel::<Vec<LogRecord>>(1);
        drop(rx);
        let result = tokio::task::spawn_blocking(move || {
            let mut tx = tx;
            tx.submit(vec![record(0)])
        })
        .await
        .unwrap();
        assert!(matches!(
            result,
            Err(crate::Error::Reader(ReaderError::SinkClosed))
        ));
    }
}
