//! Message codec
//!
//! Frames typed payloads into envelopes and back. The codec knows the tag of
//! every message kind but nothing about what the payloads mean.
//!
//! # Wire Format
//!
//! ```text
//! [type:u8][size:u16 LE][payload...]
//! ```
//!
//! When a session enables obfuscation the payload bytes are XORed with a
//! keystream before framing. File chunks and audio are sent in the clear.

mod message_type;
mod obfuscation;


pub use message_type::MessageType;
pub use obfuscation::Obfuscator;

/// Header size: type (1) + size (2)
pub const ENVELOPE_HEADER_SIZE: usize = 3;

/// Largest payload a single envelope may carry.
pub const MAX_PAYLOAD_SIZE: usize = 8192;

/// Errors that can occur when framing or unframing envelopes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Fewer bytes than an envelope header
    #[error("envelope too short: {0} bytes")]
    TooShort(usize),
    /// Tag does not name a known message kind
    #[error("unknown message type tag {0}")]
    UnknownType(u8),
    /// Declared size disagrees with the bytes actually present
    #[error("declared size {declared} disagrees with {actual} payload bytes")]
    MalformedLength { declared: usize, actual: usize },
    /// Payload larger than [`MAX_PAYLOAD_SIZE`]
    #[error("payload of {0} bytes exceeds the {MAX_PAYLOAD_SIZE} byte bound")]
    PayloadTooLarge(usize),
    /// Payload bytes do not decode as the kind's body
    #[error("failed to decode {kind:?} payload: {reason}")]
    Payload { kind: MessageType, reason: String },
}

/// A framed, typed message unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    kind: MessageType,
    payload: Vec<u8>,
}

impl Envelope {
    /// Wrap a payload, rejecting anything over the size bound.
    pub fn new(kind: MessageType, payload: Vec<u8>) -> Result<Self, CodecError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(CodecError::PayloadTooLarge(payload.len()));
        }
        Ok(Self { kind, payload })
    }

    pub fn kind(&self) -> MessageType {
        self.kind
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Payload size as carried in the header
    pub fn size(&self) -> u16 {
        // Bounded by MAX_PAYLOAD_SIZE at construction
        self.payload.len() as u16
    }
}

/// Per-session framing with optional obfuscation.
#[derive(Debug, Clone, Default)]
pub struct Codec {
    obfuscator: Option<Obfuscator>,
}

impl Codec {
    /// Codec that sends every payload in the clear
    pub fn plain() -> Self {
        Self { obfuscator: None }
    }

    /// Codec that obfuscates payloads with the given session key
    pub fn obfuscated(key: u32) -> Self {
        Self {
            obfuscator: Some(Obfuscator::new(key)),
        }
    }

    /// Build from an optional session key
    pub fn with_key(key: Option<u32>) -> Self {
        key.map_or_else(Self::plain, Self::obfuscated)
    }

    pub fn is_obfuscated(&self) -> bool {
        self.obfuscator.is_some()
    }

    /// Serialize an envelope to wire bytes
    pub fn encode(&self, envelope: &Envelope) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ENVELOPE_HEADER_SIZE + envelope.payload.len());

        bytes.push(envelope.kind.tag());
        bytes.extend_from_slice(&envelope.size().to_le_bytes());
        bytes.extend_from_slice(&envelope.payload);

        if let Some(obfuscator) = self.active_obfuscator(envelope.kind) {
            obfuscator.apply(&mut bytes[ENVELOPE_HEADER_SIZE..]);
        }

        bytes
    }

    /// Deserialize wire bytes into an envelope
    ///
    /// Validates the tag and declared size before touching the payload.
    pub fn decode(&self, bytes: &[u8]) -> Result<Envelope, CodecError> {
        if bytes.len() < ENVELOPE_HEADER_SIZE {
            return Err(CodecError::TooShort(bytes.len()));
        }

        let kind = MessageType::from_tag(bytes[0]).ok_or(CodecError::UnknownType(bytes[0]))?;

        let declared = u16::from_le_bytes([bytes[1], bytes[2]]) as usize;
        if declared > MAX_PAYLOAD_SIZE {
            return Err(CodecError::PayloadTooLarge(declared));
        }

        let actual = bytes.len() - ENVELOPE_HEADER_SIZE;
        if declared != actual {
            return Err(CodecError::MalformedLength { declared, actual });
        }

        let mut payload = bytes[ENVELOPE_HEADER_SIZE..].to_vec();
        if let Some(obfuscator) = self.active_obfuscator(kind) {
            obfuscator.apply(&mut payload);
        }

        Ok(Envelope { kind, payload })
    }

    fn active_obfuscator(&self, kind: MessageType) -> Option<&Obfuscator> {
        self.obfuscator
            .as_ref()
            .filter(|_| !kind.is_obfuscation_exempt())
    }
}
