use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::entry::AuditEntry;

#[derive(Debug, thiserror::Error)]
pub enum AuditWriteError {
    #[error("failed to create audit log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to open audit log {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize audit entry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write audit log: {0}")]
    Io(#[from] std::io::Error),
}

/// Buffered JSON-lines appender. One entry per line.
pub struct AuditWriter {
    out: BufWriter<File>,
    written: u64,
}

impl AuditWriter {
    /// Opens `path` for appending, creating it and its parent directories.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AuditWriteError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| AuditWriteError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|source| AuditWriteError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            out: BufWriter::new(file),
            written: 0,
        })
    }

    pub async fn append(&mut self, entry: &AuditEntry) -> Result<(), AuditWriteError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        self.out.write_all(&line).await?;
        self.written += 1;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), AuditWriteError> {
        self.out.flush().await?;
        Ok(())
    }

    /// Entries appended since the writer was opened.
    pub fn written(&self) -> u64 {
        self.written
    }
}
