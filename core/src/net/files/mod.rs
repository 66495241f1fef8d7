//! File distribution
//!
//! Chunked, single-flight map transfer from the host to peers missing a map.
//! The host streams one file at a time, rate-limited per tick; receivers
//! rebuild the file by offset and refresh their level list when done.
//!
//! There is no per-chunk acknowledgement. A receiver that stops making
//! progress throws its partial file away and asks again from scratch.

mod level_cache;
mod receiver;
mod sender;


pub use level_cache::LevelCache;
pub use receiver::{FileReceiver, ReceiveProgress};
pub use sender::{FileSender, OutgoingChunk};

use crate::net::messages::MAX_FILE_NAME_LEN;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("refusing file name '{0}'")]
    BadName(String),
    #[error("file of {0} bytes is too large to transfer")]
    TooLarge(u64),
    #[error("chunk at offset {got} but expected offset {expected}")]
    OutOfOrder { expected: u32, got: u32 },
    #[error("chunk overruns declared size of {0} bytes")]
    Overrun(u32),
}

/// Accept a bare file name only: no separators, no parent references
pub fn validate_file_name(name: &str) -> Result<&str, TransferError> {
    let bad = name.is_empty()
        || name.len() > MAX_FILE_NAME_LEN
        || name == "."
        || name.contains("..")
        || name.contains(['/', '\\', ':', '\0']);
    if bad {
        return Err(TransferError::BadName(name.to_string()));
    }
    Ok(name)
}
