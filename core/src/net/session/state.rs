//! Explicit session state
//!
//! Everything the handlers read or mutate about membership and configuration
//! lives here, owned by [`NetSession`](super::NetSession). Nothing is global.

use crate::net::directory::{PeerDirectory, SlotState};
use crate::net::messages::SessionConfig;
use crate::net::types::{PeerHandle, Role, SessionPhase};

#[derive(Debug, Clone)]
pub struct SessionState {
    pub role: Role,
    /// This endpoint's transport handle
    pub me: PeerHandle,
    /// Slot of the local player, known once options arrive on a client
    pub my_slot: Option<usize>,
    /// Local display name
    pub name: String,
    pub directory: PeerDirectory,
    /// Authoritative on the host, a cached copy on clients
    pub config: SessionConfig,
    pub phase: SessionPhase,
    /// Host gate checked before every slot assignment
    pub admission_open: bool,
    /// At least one options snapshot has been applied
    pub options_received: bool,
    /// Version mismatch already reported for this session
    pub version_warned: bool,
}

impl SessionState {
    pub fn new(role: Role, me: PeerHandle, name: &str, config: SessionConfig) -> Self {
        Self {
            role,
            me,
            my_slot: None,
            name: name.to_string(),
            directory: PeerDirectory::new(),
            config,
            phase: SessionPhase::Lobby,
            admission_open: role == Role::Host,
            options_received: role == Role::Host,
            version_warned: false,
        }
    }

    pub fn is_host(&self) -> bool {
        self.role == Role::Host
    }

    pub fn is_closed(&self) -> bool {
        self.phase == SessionPhase::Closed
    }

    pub fn in_game(&self) -> bool {
        self.phase == SessionPhase::InGame
    }

    /// Local slot is still waiting on its options acknowledgement
    pub fn is_joining(&self) -> bool {
        match self.my_slot {
            Some(slot) => self
                .directory
                .entry(slot)
                .is_some_and(|e| e.state == SlotState::Joining),
            None => true,
        }
    }

    /// Display name for a slot, falling back to its number
    pub fn slot_name(&self, slot: usize) -> String {
        match self.directory.entry(slot) {
            Some(entry) if !entry.name.is_empty() => entry.name.clone(),
            _ => format!("Player {slot}"),
        }
    }

    /// Slot the peer occupies, if it matches the slot it claims
    pub fn verify_sender(&self, from: PeerHandle, claimed: usize) -> bool {
        self.directory.peer(claimed) == Some(from)
    }
}
