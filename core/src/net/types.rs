//! Core types shared across the session layer

use bitcode::{Decode, Encode};

use crate::net::codec::{CodecError, MessageType};
use crate::net::directory::DirectoryError;
use crate::net::files::TransferError;
use crate::net::transport::TransportError;

/// Opaque identifier the transport assigns to a connected endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode)]
pub struct PeerHandle(pub u32);

impl std::fmt::Display for PeerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// Session role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Client,
}

/// Lifecycle of the whole session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Pre-game lobby, configuration may change
    Lobby,
    /// Simulation running, no further admissions
    InGame,
    /// Left, kicked, rejected or the host went away
    Closed,
}

/// Why the host removed a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum KickReason {
    /// More players than the game type allows
    SessionFull,
    /// Build fingerprint differs from the host's
    VersionMismatch,
    /// Host removed the player by hand
    Moderator,
}

/// Why the host refused a connection before assigning a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum RejectReason {
    /// Host halted admission
    AdmissionClosed,
    /// Simulation already running
    GameInProgress,
}

/// How a slot became empty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveReason {
    /// Explicit leaving notice
    Graceful,
    /// Transport reported a disconnect without notice
    Dropped,
    /// Removed by the host
    Kicked(KickReason),
}

/// Events surfaced by [`NetSession::poll`](crate::net::NetSession::poll)
#[derive(Debug, Clone, PartialEq)]
pub enum NetEvent {
    /// A player took a slot
    PlayerJoined { slot: usize, name: String },
    /// A slot was torn down
    PlayerLeft { slot: usize, reason: LeaveReason },
    /// Fresh options snapshot applied (clients only)
    OptionsUpdated,
    /// The host assigned this peer its slot
    SlotAssigned { slot: usize },
    /// Options carried a different version tag; the session continues
    VersionMismatch { local: String, remote: String },
    /// The host refused this peer's connection
    JoinRejected(RejectReason),
    /// This peer's own slot was removed by the host
    Kicked(KickReason),
    /// The host left, the session is over
    HostLeft,
    /// Simulation started
    GameStarted,
    /// Map download progress on the receiving side
    MapProgress { name: String, percent: u8 },
    /// Map download finished and the level list was rebuilt
    MapReceived { name: String },
    /// Host finished streaming a map to a peer
    MapSent { name: String, peer: PeerHandle },
    /// Chat line addressed to this peer
    TextReceived {
        from_slot: usize,
        text: String,
        private: bool,
    },
    /// Simulation message for the game layer
    GameMessage {
        from_slot: usize,
        kind: MessageType,
        payload: Vec<u8>,
    },
    /// Voice or other streamed audio
    AudioStream { from_slot: usize, data: Vec<u8> },
}

/// Session errors returned from explicit operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("operation requires the host role")]
    NotHost,
    #[error("operation requires the client role")]
    NotClient,
    #[error("game already started")]
    GameInProgress,
    #[error("session is closed")]
    Closed,
    #[error("local peer has no slot yet")]
    NoSlot,
    #[error("not every human player is ready")]
    NotAllReady,
    #[error("slot {0} is out of range")]
    InvalidSlot(usize),
    #[error("slot {0} is not occupied by a human")]
    NotHuman(usize),
    #[error("structure limit list is full")]
    StructureLimitsFull,
    #[error("the local player cannot be kicked")]
    CannotKickSelf,
    #[error("{0} is not a simulation message kind")]
    NotGameTraffic(MessageType),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
}
