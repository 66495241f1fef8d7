//! Receiving side of a map transfer

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::{TransferError, validate_file_name};
use crate::net::messages::FileChunk;

/// Outcome of applying one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveProgress {
    InProgress { name: String, percent: u8 },
    Complete { name: String, path: PathBuf },
}

#[derive(Debug)]
struct IncomingTransfer {
    file: File,
    name: String,
    path: PathBuf,
    total_bytes: u32,
    received: u32,
    last_progress: Instant,
}

/// Rebuilds files chunk by chunk inside one directory
#[derive(Debug)]
pub struct FileReceiver {
    dir: PathBuf,
    current: Option<IncomingTransfer>,
}

impl FileReceiver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            current: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_receiving(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current.as_ref().map(|t| t.name.as_str())
    }

    /// No chunk arrived for longer than `timeout`
    pub fn is_stalled(&self, now: Instant, timeout: Duration) -> bool {
        self.current
            .as_ref()
            .is_some_and(|t| now.saturating_duration_since(t.last_progress) > timeout)
    }

    /// Apply a chunk
    ///
    /// The destination file is created on the chunk at offset 0 and closed on
    /// the chunk that reaches the declared size. Any chunk that is not the
    /// next expected one discards the partial file.
    pub fn receive_chunk(&mut self, chunk: &FileChunk, now: Instant) -> Result<ReceiveProgress, TransferError> {
        let name = validate_file_name(&chunk.name)?;

        if chunk.offset == 0 {
            if self.current.is_some() {
                tracing::debug!(file = name, "Transfer restarted from the beginning");
                self.abort();
            }
            fs::create_dir_all(&self.dir)?;
            let path = self.dir.join(name);
            let file = File::create(&path)?;
            self.current = Some(IncomingTransfer {
                file,
                name: name.to_string(),
                path,
                total_bytes: chunk.total_bytes,
                received: 0,
                last_progress: now,
            });
        }

        let expected = match self.current.as_ref() {
            Some(t) if t.name == name && t.total_bytes == chunk.total_bytes => t.received,
            Some(_) => {
                self.abort();
                return Err(TransferError::OutOfOrder {
                    expected: 0,
                    got: chunk.offset,
                });
            }
            None => {
                return Err(TransferError::OutOfOrder {
                    expected: 0,
                    got: chunk.offset,
                });
            }
        };
        if chunk.offset != expected {
            self.abort();
            return Err(TransferError::OutOfOrder {
                expected,
                got: chunk.offset,
            });
        }
        if chunk.offset as u64 + chunk.data.len() as u64 > chunk.total_bytes as u64 {
            self.abort();
            return Err(TransferError::Overrun(chunk.total_bytes));
        }

        if let Err(e) = self.write_chunk(chunk, now) {
            self.abort();
            return Err(e);
        }

        let percent = chunk.progress();
        if !chunk.is_last() {
            return Ok(ReceiveProgress::InProgress {
                name: name.to_string(),
                percent,
            });
        }

        match self.current.take() {
            Some(transfer) => {
                transfer.file.sync_all()?;
                tracing::info!(file = %transfer.name, bytes = transfer.received, "File received");
                Ok(ReceiveProgress::Complete {
                    name: transfer.name,
                    path: transfer.path,
                })
            }
            None => Err(TransferError::OutOfOrder {
                expected: 0,
                got: chunk.offset,
            }),
        }
    }

    fn write_chunk(&mut self, chunk: &FileChunk, now: Instant) -> Result<(), TransferError> {
        if let Some(transfer) = self.current.as_mut() {
            transfer.file.write_all(&chunk.data)?;
            transfer.received += chunk.chunk_bytes();
            transfer.last_progress = now;
        }
        Ok(())
    }

    /// Drop the partial file, if any
    pub fn abort(&mut self) {
        if let Some(transfer) = self.current.take() {
            drop(transfer.file);
            if let Err(e) = fs::remove_file(&transfer.path) {
                tracing::warn!(error = %e, path = %transfer.path.display(), "Failed to remove partial file");
            }
        }
    }
}
