//! Session message bodies
//!
//! [`MessageBody`] has one variant per message kind. Bodies are decoded once
//! from an [`Envelope`] and then dispatched by kind. Structured payloads use
//! bitcode; file chunks keep a fixed hand-framed layout; audio and simulation
//! traffic pass through as raw bytes.

use bitcode::Decode;

use crate::net::codec::{CodecError, Envelope, MessageType};

mod chat;
mod file;
mod lobby;
mod options;

#[cfg(test)]
mod tests;

pub use chat::{AiTextMessage, BeaconMessage, TextMessage};
pub use file::{FILE_CHUNK_HEADER_SIZE, FileChunk, MAX_FILE_NAME_LEN};
pub use lobby::{
    ColourRequest, JoinRejected, KickNotice, LeavingNotice, MapRequest, PingPayload,
    PlayerResponding, ReadyRequest, TeamRequest, UNSEATED_SLOT, VersionCheck,
};
pub use options::{
    AlliancesMode, BaseType, GameType, NewPlayer, OptionsSnapshot, PowerLevel, SessionConfig,
    SlotInfo, StructureLimit,
};

// ============================================================================
// Message Body
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Options(OptionsSnapshot),
    Leaving(LeavingNotice),
    Kick(KickNotice),
    JoinRejected(JoinRejected),
    PlayerResponding(PlayerResponding),
    VersionCheck(VersionCheck),
    ColourRequest(ColourRequest),
    TeamRequest(TeamRequest),
    ReadyRequest(ReadyRequest),
    FireUp,
    RequestMap(MapRequest),
    FileChunk(FileChunk),
    Text(TextMessage),
    AiText(AiTextMessage),
    Beacon(BeaconMessage),
    Ping(PingPayload),
    Pong(PingPayload),
    AudioStream(Vec<u8>),
    /// Simulation traffic, opaque to the session layer
    Game { kind: MessageType, payload: Vec<u8> },
}

impl MessageBody {
    pub fn kind(&self) -> MessageType {
        match self {
            Self::Options(_) => MessageType::Options,
            Self::Leaving(_) => MessageType::Leaving,
            Self::Kick(_) => MessageType::Kick,
            Self::JoinRejected(_) => MessageType::JoinRejected,
            Self::PlayerResponding(_) => MessageType::PlayerResponding,
            Self::VersionCheck(_) => MessageType::VersionCheck,
            Self::ColourRequest(_) => MessageType::ColourRequest,
            Self::TeamRequest(_) => MessageType::TeamRequest,
            Self::ReadyRequest(_) => MessageType::ReadyRequest,
            Self::FireUp => MessageType::FireUp,
            Self::RequestMap(_) => MessageType::RequestMap,
            Self::FileChunk(_) => MessageType::FileChunk,
            Self::Text(_) => MessageType::Text,
            Self::AiText(_) => MessageType::AiText,
            Self::Beacon(_) => MessageType::Beacon,
            Self::Ping(_) => MessageType::Ping,
            Self::Pong(_) => MessageType::Pong,
            Self::AudioStream(_) => MessageType::AudioStream,
            Self::Game { kind, .. } => *kind,
        }
    }

    /// Serialize into an envelope
    ///
    /// Fails only when the payload would exceed the envelope size bound.
    pub fn to_envelope(&self) -> Result<Envelope, CodecError> {
        let payload = match self {
            Self::Options(m) => bitcode::encode(m),
            Self::Leaving(m) => bitcode::encode(m),
            Self::Kick(m) => bitcode::encode(m),
            Self::JoinRejected(m) => bitcode::encode(m),
            Self::PlayerResponding(m) => bitcode::encode(m),
            Self::VersionCheck(m) => bitcode::encode(m),
            Self::ColourRequest(m) => bitcode::encode(m),
            Self::TeamRequest(m) => bitcode::encode(m),
            Self::ReadyRequest(m) => bitcode::encode(m),
            Self::FireUp => Vec::new(),
            Self::RequestMap(m) => bitcode::encode(m),
            Self::FileChunk(chunk) => chunk.to_bytes(),
            Self::Text(m) => bitcode::encode(m),
            Self::AiText(m) => bitcode::encode(m),
            Self::Beacon(m) => bitcode::encode(m),
            Self::Ping(m) | Self::Pong(m) => bitcode::encode(m),
            Self::AudioStream(data) => data.clone(),
            Self::Game { payload, .. } => payload.clone(),
        };
        Envelope::new(self.kind(), payload)
    }

    /// Decode the body carried by an envelope
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, CodecError> {
        let kind = envelope.kind();
        let bytes = envelope.payload();

        let body = match kind {
            MessageType::Options => Self::Options(decode(kind, bytes)?),
            MessageType::Leaving => Self::Leaving(decode(kind, bytes)?),
            MessageType::Kick => Self::Kick(decode(kind, bytes)?),
            MessageType::JoinRejected => Self::JoinRejected(decode(kind, bytes)?),
            MessageType::PlayerResponding => Self::PlayerResponding(decode(kind, bytes)?),
            MessageType::VersionCheck => Self::VersionCheck(decode(kind, bytes)?),
            MessageType::ColourRequest => Self::ColourRequest(decode(kind, bytes)?),
            MessageType::TeamRequest => Self::TeamRequest(decode(kind, bytes)?),
            MessageType::ReadyRequest => Self::ReadyRequest(decode(kind, bytes)?),
            MessageType::FireUp => Self::FireUp,
            MessageType::RequestMap => Self::RequestMap(decode(kind, bytes)?),
            MessageType::FileChunk => Self::FileChunk(FileChunk::from_bytes(bytes)?),
            MessageType::Text => Self::Text(decode(kind, bytes)?),
            MessageType::AiText => Self::AiText(decode(kind, bytes)?),
            MessageType::Beacon => Self::Beacon(decode(kind, bytes)?),
            MessageType::Ping => Self::Ping(decode(kind, bytes)?),
            MessageType::Pong => Self::Pong(decode(kind, bytes)?),
            MessageType::AudioStream => Self::AudioStream(bytes.to_vec()),
            game => Self::Game {
                kind: game,
                payload: bytes.to_vec(),
            },
        };
        Ok(body)
    }
}

fn decode<T>(kind: MessageType, bytes: &[u8]) -> Result<T, CodecError>
where
    T: for<'a> Decode<'a>,
{
    bitcode::decode(bytes).map_err(|e| CodecError::Payload {
        kind,
        reason: e.to_string(),
    })
}

