//! Multiplayer session synchronization
//!
//! Layers, leaves first:
//!
//! - [`codec`] - tagged, length-prefixed envelopes with optional obfuscation
//! - [`directory`] - slot to peer mapping and per-slot lobby settings
//! - [`responsibility`] - which peer simulates an unowned slot
//! - [`session`] - join/leave, options sync and dispatch
//! - [`files`] - chunked single-flight map transfer
//! - [`msg_queue`] - deferred script events
//! - [`text`] - chat addressing and routing
//!
//! ```text
//!   game / script          embedder UI
//!        ▲                      ▲
//!        │ GameStateMutator     │ NetEvent, ConsoleLine
//!   ┌────┴──────────────────────┴────┐
//!   │            NetSession          │
//!   │  directory · files · msg_queue │
//!   │          text · console        │
//!   └───────────────┬────────────────┘
//!                   │ Codec
//!   ┌───────────────▼────────────────┐
//!   │   Transport (loopback / UDP)   │
//!   └────────────────────────────────┘
//! ```

pub mod codec;
pub mod console;
pub mod directory;
pub mod files;
pub mod game;
pub mod messages;
pub mod msg_queue;
pub mod responsibility;
pub mod session;
pub mod text;
pub mod transport;
pub mod types;

pub use codec::{Codec, CodecError, Envelope, MessageType};
pub use console::{ConsoleLine, ConsoleLog};
pub use directory::{DirectoryError, PeerDirectory, SlotEntry, SlotState};
pub use files::{FileReceiver, FileSender, LevelCache, TransferError};
pub use game::{GameStateMutator, RecordingGame};
pub use messages::{MessageBody, OptionsSnapshot, SessionConfig};
pub use msg_queue::{DeferredEvent, DeferredEventQueue, DeferredKind, QueueFullError, ScriptCallbacks};
pub use session::{NetSession, SessionState};
pub use text::{Route, TextAddress, TextRouter, parse_address};
pub use transport::{
    DEFAULT_PORT, LoopbackHub, LoopbackTransport, Transport, TransportError, TransportEvent,
    UdpTransport,
};
pub use types::{
    KickReason, LeaveReason, NetEvent, PeerHandle, RejectReason, Role, SessionError, SessionPhase,
};
