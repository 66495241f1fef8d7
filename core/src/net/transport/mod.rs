//! Transport session abstraction
//!
//! The session layer hands framed bytes to a [`Transport`] and pulls
//! [`TransportEvent`]s back out. Reads never block; an empty queue is the
//! normal idle state.
//!
//! - [`LoopbackTransport`] - in-memory mesh for tests and embedding
//! - [`UdpTransport`] - non-blocking UDP star with the host relaying

mod loopback;
mod udp;

pub use loopback::{LoopbackHub, LoopbackTransport};
pub use udp::{DEFAULT_PORT, UdpTransport};

use crate::net::types::PeerHandle;

/// Something the transport observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A new peer attached (host only)
    Connected { peer: PeerHandle, name: String },
    /// A peer went away without saying so
    Disconnected { peer: PeerHandle },
    /// Framed bytes from a peer
    Message { from: PeerHandle, bytes: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,
    #[error("unknown {0}")]
    UnknownPeer(PeerHandle),
    #[error("no host is listening")]
    NoHost,
    #[error("failed to bind: {0}")]
    Bind(String),
    #[error("invalid address '{0}'")]
    AddressParse(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("timed out waiting for the host")]
    Timeout,
}

/// Peer-addressed datagram session with a distinguished host
pub trait Transport {
    /// Handle of this endpoint
    fn local_peer(&self) -> PeerHandle;

    /// Handle of the host endpoint
    fn host_peer(&self) -> PeerHandle;

    fn is_host(&self) -> bool {
        self.local_peer() == self.host_peer()
    }

    /// Send to every other peer
    fn broadcast(&mut self, bytes: &[u8], reliable: bool) -> Result<(), TransportError>;

    /// Send to one peer
    fn send_to(&mut self, peer: PeerHandle, bytes: &[u8], reliable: bool) -> Result<(), TransportError>;

    /// Next pending event, if any
    fn receive_one(&mut self) -> Option<TransportEvent>;

    /// Drop one peer's connection (host only)
    fn disconnect(&mut self, peer: PeerHandle);

    /// Leave the session
    fn close(&mut self);
}
