//! Membership teardown: graceful leave, silent drop and kick
//!
//! All three paths end in [`NetSession::teardown_slot`], which is a no-op for
//! a slot that is already empty. Duplicate notices are therefore harmless.

use skirmish_shared::MAX_SLOTS;

use super::NetSession;
use crate::net::game::GameStateMutator;
use crate::net::messages::{KickNotice, LeavingNotice, MessageBody, PlayerResponding};
use crate::net::transport::Transport;
use crate::net::types::{KickReason, LeaveReason, NetEvent, PeerHandle, SessionError};

impl<T: Transport, G: GameStateMutator> NetSession<T, G> {
    /// Clear a slot's entities and return it to empty
    ///
    /// Returns false if there was nothing to tear down.
    pub(super) fn teardown_slot(&mut self, slot: usize, reason: LeaveReason) -> bool {
        let name = self.state.slot_name(slot);
        let peer = self.state.directory.peer(slot);
        if !self.state.directory.begin_leave(slot) {
            tracing::debug!(slot, "Slot already empty, ignoring leave");
            return false;
        }

        self.game.clear_player_entities(slot);
        if let Some(peer) = peer {
            self.sender.cancel_for(peer);
        }
        self.state.directory.release(slot);

        let notice = match reason {
            LeaveReason::Graceful => format!("{name} has left the game"),
            LeaveReason::Dropped => format!("{name} has been disconnected"),
            LeaveReason::Kicked(kick) => format!("{name} was kicked ({kick:?})"),
        };
        self.console.notice(notice);
        self.events.push_back(NetEvent::PlayerLeft { slot, reason });
        tracing::info!(slot, ?reason, "Slot torn down");
        true
    }

    /// Transport reported a peer gone without a leaving notice
    pub(super) fn on_peer_dropped(&mut self, peer: PeerHandle) {
        if !self.state.is_host() && peer == self.transport.host_peer() {
            tracing::warn!(%peer, "Lost connection to host");
            self.host_gone();
            return;
        }

        let Some(slot) = self.state.directory.find(peer) else {
            tracing::debug!(%peer, "Disconnect from a peer without a slot");
            return;
        };
        tracing::warn!(slot, %peer, "Player left unexpectedly");
        self.teardown_slot(slot, LeaveReason::Dropped);

        if self.state.is_host() {
            // Peers that cannot see the transport event learn of it from us
            let notice = MessageBody::Leaving(LeavingNotice {
                slot: slot as u8,
                host: false,
            });
            if let Err(e) = self.broadcast(&notice) {
                tracing::warn!(slot, error = %e, "Failed to announce dropped player");
            }
        }
    }

    fn host_gone(&mut self) {
        if let Some(slot) = self.state.directory.find(self.transport.host_peer()) {
            self.teardown_slot(slot, LeaveReason::Graceful);
        }
        self.console.notice("The host has left, the game is over");
        self.events.push_back(NetEvent::HostLeft);
        self.close_session();
    }

    pub(super) fn recv_leaving(&mut self, from: PeerHandle, message: LeavingNotice) -> Result<(), SessionError> {
        let slot = message.slot as usize;

        if message.host {
            if !self.state.is_host() && self.from_host(from) {
                self.host_gone();
            } else {
                tracing::warn!(peer = %from, "Host leaving notice from a non-host peer");
            }
            return Ok(());
        }

        if Some(slot) == self.state.my_slot {
            tracing::warn!(peer = %from, slot, "Leaving notice names the local slot, ignoring");
            return Ok(());
        }
        if !self.from_host(from) && !self.state.verify_sender(from, slot) {
            tracing::debug!(peer = %from, slot, "Leaving notice for a slot the sender does not own");
            return Ok(());
        }

        self.teardown_slot(slot, LeaveReason::Graceful);
        Ok(())
    }

    pub(super) fn recv_kick(&mut self, from: PeerHandle, message: KickNotice) -> Result<(), SessionError> {
        if self.state.is_host() || !self.from_host(from) {
            tracing::warn!(peer = %from, "Kick notice from a non-host peer");
            return Ok(());
        }
        let slot = message.slot as usize;

        if slot >= MAX_SLOTS {
            if self.state.my_slot.is_none() {
                tracing::warn!(reason = ?message.reason, "Turned away by host before seating");
                self.kicked(message.reason);
            }
            return Ok(());
        }

        if Some(slot) == self.state.my_slot {
            tracing::warn!(slot, reason = ?message.reason, "Kicked by host");
            self.teardown_slot(slot, LeaveReason::Kicked(message.reason));
            self.kicked(message.reason);
            return Ok(());
        }

        self.teardown_slot(slot, LeaveReason::Kicked(message.reason));
        Ok(())
    }

    fn kicked(&mut self, reason: KickReason) {
        self.console.notice(format!("You have been kicked ({reason:?})"));
        self.events.push_back(NetEvent::Kicked(reason));
        self.state.my_slot = None;
        self.close_session();
    }

    /// A joining peer applied its options; clear the joining flag
    pub(super) fn recv_player_responding(
        &mut self,
        from: PeerHandle,
        message: PlayerResponding,
    ) -> Result<(), SessionError> {
        let slot = message.slot as usize;
        if !self.state.verify_sender(from, slot) {
            tracing::debug!(peer = %from, slot, "Responding notice for a slot the peer does not own");
            return Ok(());
        }
        if self.state.directory.mark_active(slot) {
            tracing::debug!(slot, "Player finished joining");
        }
        Ok(())
    }

    /// Leave the session gracefully
    ///
    /// Announces the departure and closes the transport. When the host leaves
    /// the session ends for everyone.
    pub fn leave(&mut self) -> Result<(), SessionError> {
        if self.state.is_closed() {
            return Ok(());
        }
        let is_host = self.state.is_host();
        let result = match self.state.my_slot {
            Some(slot) => self.broadcast(&MessageBody::Leaving(LeavingNotice {
                slot: slot as u8,
                host: is_host,
            })),
            None => Ok(()),
        };
        tracing::info!(host = is_host, "Leaving session");
        self.close_session();
        result
    }
}
