use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::entry::AuditEntry;
use crate::writer::{AuditWriteError, AuditWriter};

const CHANNEL_CAPACITY: usize = 256;

/// Buffered entries are flushed after this long without new ones.
const IDLE_FLUSH: Duration = Duration::from_millis(500);

/// Cloneable handle feeding the background audit writer.
///
/// The writer task exits after the last clone is dropped, flushing first.
#[derive(Clone)]
pub struct AuditSink {
    tx: mpsc::Sender<AuditEntry>,
    dropped: Arc<AtomicU64>,
}

impl AuditSink {
    /// Opens the log at `path` and spawns the writer task.
    pub async fn start(
        path: impl AsRef<Path>,
    ) -> Result<(Self, JoinHandle<u64>), AuditWriteError> {
        let writer = AuditWriter::open(path).await?;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let handle = tokio::spawn(drain(writer, rx));

        Ok((
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            handle,
        ))
    }

    /// Queues an entry, waiting for channel space if necessary.
    pub async fn log(&self, entry: AuditEntry) {
        if let Err(err) = self.tx.send(entry).await {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(event_type = ?err.0.event_type, "audit writer gone; entry dropped");
        }
    }

    /// Queues an entry without waiting. Returns `false` and counts the entry
    /// as dropped when the channel is full or closed.
    pub fn try_log(&self, entry: AuditEntry) -> bool {
        match self.tx.try_send(entry) {
            Ok(()) => true,
            Err(err) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                let entry = match err {
                    mpsc::error::TrySendError::Full(entry)
                    | mpsc::error::TrySendError::Closed(entry) => entry,
                };
                tracing::warn!(event_type = ?entry.event_type, "audit channel unavailable; entry dropped");
                false
            }
        }
    }

    /// Entries that never reached the writer.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Writes entries as they arrive and flushes once the channel goes idle or
/// closes. Returns the number of entries written.
async fn drain(mut writer: AuditWriter, mut rx: mpsc::Receiver<AuditEntry>) -> u64 {
    let mut pending = false;

    loop {
        match tokio::time::timeout(IDLE_FLUSH, rx.recv()).await {
            Ok(Some(entry)) => match writer.append(&entry).await {
                Ok(()) => pending = true,
                Err(err) => tracing::error!(%err, "failed to append audit entry"),
            },
            Ok(None) => break,
            Err(_idle) => {
                if pending {
                    match writer.flush().await {
                        Ok(()) => pending = false,
                        Err(err) => tracing::error!(%err, "audit flush failed"),
                    }
                }
            }
        }
    }

    if pending {
        if let Err(err) = writer.flush().await {
            tracing::error!(%err, "final audit flush failed");
        }
    }
    tracing::debug!(written = writer.written(), "audit writer stopped");
    writer.written()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{AuditEventType, AuditSource};

    fn entry(event: AuditEventType) -> AuditEntry {
        AuditEntry::new(event, AuditSource::new("test"), serde_json::Value::Null)
    }

    #[tokio::test]
    async fn entries_are_flushed_when_sink_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let (sink, handle) = AuditSink::start(&path).await.unwrap();
        sink.log(entry(AuditEventType::ProcessStarted)).await;
        assert!(sink.try_log(entry(AuditEventType::PolicyLoaded)));
        sink.clone().log(entry(AuditEventType::ProcessStopped)).await;
        drop(sink);

        assert_eq!(handle.await.unwrap(), 3);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 3);
    }

    #[tokio::test]
    async fn entries_after_writer_exit_are_counted_as_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let (sink, handle) = AuditSink::start(dir.path().join("audit.jsonl")).await.unwrap();
        handle.abort();
        let _ = handle.await;

        assert!(!sink.try_log(entry(AuditEventType::RuleAdded)));
        sink.log(entry(AuditEventType::GroupAdded)).await;
        assert_eq!(sink.dropped(), 2);
    }
}
