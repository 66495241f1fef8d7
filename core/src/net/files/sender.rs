//! Host side of a map transfer

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::{Duration, Instant};

use super::{TransferError, validate_file_name};
use crate::net::messages::FileChunk;
use crate::net::types::PeerHandle;

/// A chunk ready to go out, plus sender-side progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingChunk {
    pub target: PeerHandle,
    pub chunk: FileChunk,
    /// 100 on the final chunk
    pub percent: u8,
}

#[derive(Debug)]
struct OutgoingTransfer {
    file: File,
    name: String,
    target: PeerHandle,
    total_bytes: u32,
    bytes_sent: u32,
    last_sent: Option<Instant>,
}

/// Single-flight file streamer
#[derive(Debug)]
pub struct FileSender {
    active: Option<OutgoingTransfer>,
    chunk_size: usize,
    interval: Duration,
}

impl FileSender {
    pub fn new(chunk_size: usize, interval: Duration) -> Self {
        Self {
            active: None,
            chunk_size: chunk_size.max(1),
            interval,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Peer and file name of the running transfer
    pub fn active_transfer(&self) -> Option<(PeerHandle, &str)> {
        self.active.as_ref().map(|t| (t.target, t.name.as_str()))
    }

    /// Start sending `path` to `peer` unless a transfer is already running
    ///
    /// Returns `Ok(false)` when the request was dropped because the slot is
    /// busy; the peer is expected to ask again later.
    pub fn request_file(&mut self, peer: PeerHandle, path: &Path) -> Result<bool, TransferError> {
        if let Some((target, name)) = self.active_transfer() {
            tracing::debug!(%peer, busy_with = name, %target, "Transfer already active, dropping request");
            return Ok(false);
        }
        self.begin_transfer(peer, path)?;
        Ok(true)
    }

    /// Open `path` and prepare to stream it
    pub fn begin_transfer(&mut self, peer: PeerHandle, path: &Path) -> Result<(), TransferError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TransferError::BadName(path.display().to_string()))?;
        let name = validate_file_name(name)?.to_string();

        let mut file = File::open(path)?;

        // Size pass, then rewind for the real reads
        let length = io::copy(&mut file, &mut io::sink())?;
        file.seek(SeekFrom::Start(0))?;
        let total_bytes = u32::try_from(length).map_err(|_| TransferError::TooLarge(length))?;

        tracing::info!(%peer, file = %name, bytes = total_bytes, "Starting file transfer");

        self.active = Some(OutgoingTransfer {
            file,
            name,
            target: peer,
            total_bytes,
            bytes_sent: 0,
            last_sent: None,
        });
        Ok(())
    }

    /// Produce the next chunk if the rate limit allows
    ///
    /// Returns `Ok(None)` when idle or throttled. The final chunk carries
    /// 100% and frees the transfer slot.
    pub fn continue_transfer(&mut self, now: Instant) -> Result<Option<OutgoingChunk>, TransferError> {
        let Some(transfer) = self.active.as_mut() else {
            return Ok(None);
        };
        if let Some(last) = transfer.last_sent {
            if now.saturating_duration_since(last) < self.interval {
                return Ok(None);
            }
        }

        let remaining = (transfer.total_bytes - transfer.bytes_sent) as usize;
        let want = remaining.min(self.chunk_size);
        let mut data = Vec::with_capacity(want);

        let read = (&mut transfer.file)
            .take(want as u64)
            .read_to_end(&mut data);
        if let Err(e) = read {
            self.active = None;
            return Err(e.into());
        }
        if data.len() < want {
            self.active = None;
            return Err(TransferError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "file shrank during transfer",
            )));
        }

        let chunk = FileChunk {
            total_bytes: transfer.total_bytes,
            offset: transfer.bytes_sent,
            name: transfer.name.clone(),
            data,
        };
        transfer.bytes_sent += chunk.chunk_bytes();
        transfer.last_sent = Some(now);

        let percent = chunk.progress();
        let target = transfer.target;

        if transfer.bytes_sent >= transfer.total_bytes {
            tracing::info!(peer = %target, file = %transfer.name, "File sent");
            self.active = None;
        }

        Ok(Some(OutgoingChunk {
            target,
            chunk,
            percent,
        }))
    }

    /// Abandon the transfer if it targets `peer`
    pub fn cancel_for(&mut self, peer: PeerHandle) -> bool {
        if self.active.as_ref().is_some_and(|t| t.target == peer) {
            tracing::info!(%peer, "Cancelling file transfer, peer left");
            self.active = None;
            return true;
        }
        false
    }

    pub fn cancel(&mut self) {
        self.active = None;
    }
}
