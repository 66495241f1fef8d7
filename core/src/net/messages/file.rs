//! File chunk packet
//!
//! Hand-framed so the layout is fixed on the wire:
//!
//! ```text
//! [total:u32][chunk:u32][offset:u32][name_len:u8][name][data]
//! ```

use byteorder::{ByteOrder, LittleEndian};

use crate::net::codec::{CodecError, MessageType};

/// Fixed part of a chunk packet
pub const FILE_CHUNK_HEADER_SIZE: usize = 13;

/// Longest file name a chunk can carry
pub const MAX_FILE_NAME_LEN: usize = u8::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChunk {
    pub total_bytes: u32,
    pub offset: u32,
    pub name: String,
    pub data: Vec<u8>,
}

impl FileChunk {
    pub fn chunk_bytes(&self) -> u32 {
        self.data.len() as u32
    }

    /// True if this chunk ends the file
    pub fn is_last(&self) -> bool {
        self.offset as u64 + self.data.len() as u64 >= self.total_bytes as u64
    }

    /// Receiver-side progress after applying this chunk, 0-100
    pub fn progress(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        let done = self.offset as u64 + self.data.len() as u64;
        (done * 100 / self.total_bytes as u64).min(100) as u8
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let name = &self.name.as_bytes()[..self.name.len().min(MAX_FILE_NAME_LEN)];
        let mut bytes = vec![0u8; FILE_CHUNK_HEADER_SIZE];

        LittleEndian::write_u32(&mut bytes[0..4], self.total_bytes);
        LittleEndian::write_u32(&mut bytes[4..8], self.chunk_bytes());
        LittleEndian::write_u32(&mut bytes[8..12], self.offset);
        bytes[12] = name.len() as u8;
        bytes.extend_from_slice(name);
        bytes.extend_from_slice(&self.data);

        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < FILE_CHUNK_HEADER_SIZE {
            return Err(malformed(format!("{} bytes is shorter than the chunk header", bytes.len())));
        }

        let total_bytes = LittleEndian::read_u32(&bytes[0..4]);
        let chunk_bytes = LittleEndian::read_u32(&bytes[4..8]) as usize;
        let offset = LittleEndian::read_u32(&bytes[8..12]);
        let name_len = bytes[12] as usize;

        let expected = FILE_CHUNK_HEADER_SIZE + name_len + chunk_bytes;
        if bytes.len() != expected {
            return Err(malformed(format!(
                "chunk declares {} bytes, packet has {}",
                expected,
                bytes.len()
            )));
        }

        let name_end = FILE_CHUNK_HEADER_SIZE + name_len;
        let name = std::str::from_utf8(&bytes[FILE_CHUNK_HEADER_SIZE..name_end])
            .map_err(|e| malformed(format!("file name is not UTF-8: {}", e)))?
            .to_string();

        Ok(Self {
            total_bytes,
            offset,
            name,
            data: bytes[name_end..].to_vec(),
        })
    }
}

fn malformed(reason: String) -> CodecError {
    CodecError::Payload {
        kind: MessageType::FileChunk,
        reason,
    }
}
