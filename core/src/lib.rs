//! Skirmish Core - multiplayer session synchronization
//!
//! This crate admits and tracks remote players, distributes the host's
//! authoritative configuration, keeps AI responsibility consistent across
//! peers, streams maps to joiners and defers inbound script events to the
//! simulation tick.
//!
//! # Architecture
//!
//! - [`NetSession`] - Host or client session, polled once per tick
//! - [`Transport`] - Peer-addressed datagram session (loopback or UDP)
//! - [`GameStateMutator`] - Boundary to the game simulation
//! - [`config`] - Tunables loaded from `config.toml`

pub mod config;
pub mod net;

pub use config::NetConfig;
pub use net::{
    GameStateMutator, LoopbackHub, NetEvent, NetSession, PeerHandle, SessionConfig, SessionError,
    Transport, UdpTransport,
};
