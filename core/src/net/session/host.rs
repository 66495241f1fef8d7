//! Host-only operations: admission, moderation, configuration authority and
//! map serving

use skirmish_shared::{BuildInfo, MAX_SLOTS};

use super::NetSession;
use crate::net::directory::DirectoryError;
use crate::net::files::validate_file_name;
use crate::net::game::GameStateMutator;
use crate::net::messages::{
    ColourRequest, JoinRejected, KickNotice, UNSEATED_SLOT, MapRequest, MessageBody, NewPlayer, OptionsSnapshot,
    ReadyRequest, SessionConfig, TeamRequest, TextMessage, VersionCheck,
};
use crate::net::transport::Transport;
use crate::net::types::{
    KickReason, LeaveReason, NetEvent, PeerHandle, RejectReason, SessionError, SessionPhase,
};

impl<T: Transport, G: GameStateMutator> NetSession<T, G> {
    // ========================================================================
    // Admission
    // ========================================================================

    /// Handle a transport-level connection
    pub(super) fn admit(&mut self, peer: PeerHandle, name: &str) -> Result<(), SessionError> {
        if !self.state.is_host() {
            tracing::warn!(%peer, "Ignoring connection event on a client");
            return Ok(());
        }

        if self.state.in_game() {
            return self.reject(peer, RejectReason::GameInProgress);
        }
        if !self.state.admission_open {
            return self.reject(peer, RejectReason::AdmissionClosed);
        }

        let max_players = self.state.config.max_players as usize;
        let slot = match self.state.directory.assign_slot(peer, max_players, &mut self.rng) {
            Ok(slot) => slot,
            Err(DirectoryError::SessionFull) => return self.kick_unseated(peer, KickReason::SessionFull),
            Err(e) => return Err(e.into()),
        };
        self.state.directory.set_name(slot, name);
        let name = self.state.slot_name(slot);

        self.game.spawn_remote_proxy(slot);
        self.console.notice(format!("{name} joined the game"));
        self.events.push_back(NetEvent::PlayerJoined {
            slot,
            name: name.clone(),
        });
        tracing::info!(slot, %peer, name = %name, "Player joined");

        self.send_options(Some(NewPlayer {
            peer,
            slot: slot as u8,
        }))?;

        if self.state.directory.occupied_count() > max_players {
            tracing::info!(slot, max_players, "Session over capacity, kicking newcomer");
            self.kick(slot, KickReason::SessionFull)?;
        }
        Ok(())
    }

    /// Kick a peer that never got a slot
    ///
    /// The notice names no slot, so only the peer without one acts on it.
    fn kick_unseated(&mut self, peer: PeerHandle, reason: KickReason) -> Result<(), SessionError> {
        tracing::info!(%peer, ?reason, "Every slot taken, kicking newcomer");
        let notice = MessageBody::Kick(KickNotice {
            slot: UNSEATED_SLOT,
            reason,
        });
        let result = self.send_to(peer, &notice);
        self.transport.disconnect(peer);
        result
    }

    fn reject(&mut self, peer: PeerHandle, reason: RejectReason) -> Result<(), SessionError> {
        tracing::info!(%peer, ?reason, "Rejecting connection");
        let result = self.send_to(peer, &MessageBody::JoinRejected(JoinRejected { reason }));
        self.transport.disconnect(peer);
        result
    }

    /// Stop assigning slots to new connections
    pub fn halt_admission(&mut self) -> Result<(), SessionError> {
        self.require_host()?;
        if self.state.admission_open {
            tracing::info!("Admission halted");
            self.state.admission_open = false;
        }
        Ok(())
    }

    /// Remove the human in `slot` from the session
    ///
    /// Every peer, the victim included, tears the slot down on receipt.
    pub fn kick(&mut self, slot: usize, reason: KickReason) -> Result<(), SessionError> {
        self.require_host()?;
        if slot >= MAX_SLOTS {
            return Err(SessionError::InvalidSlot(slot));
        }
        if Some(slot) == self.state.my_slot {
            return Err(SessionError::CannotKickSelf);
        }
        let peer = self
            .state
            .directory
            .peer(slot)
            .ok_or(SessionError::NotHuman(slot))?;

        tracing::info!(slot, %peer, ?reason, "Kicking player");
        let notice = MessageBody::Kick(KickNotice {
            slot: slot as u8,
            reason,
        });
        let sent = self.broadcast(&notice);
        self.teardown_slot(slot, LeaveReason::Kicked(reason));
        self.transport.disconnect(peer);
        sent
    }

    /// Fire up the simulation
    ///
    /// Requires every human to be ready. Admission closes for good.
    pub fn start_game(&mut self) -> Result<(), SessionError> {
        self.require_host()?;
        if self.state.phase != SessionPhase::Lobby {
            return Err(SessionError::GameInProgress);
        }
        if !self.state.directory.all_humans_ready() {
            return Err(SessionError::NotAllReady);
        }

        self.broadcast(&MessageBody::FireUp)?;
        self.state.phase = SessionPhase::InGame;
        self.state.admission_open = false;
        self.console.notice("Game started");
        self.events.push_back(NetEvent::GameStarted);
        tracing::info!(players = self.state.directory.human_count(), "Game started");
        Ok(())
    }

    // ========================================================================
    // Options authority
    // ========================================================================

    /// Broadcast the whole configuration and slot table
    pub(super) fn send_options(&mut self, new_player: Option<NewPlayer>) -> Result<(), SessionError> {
        let snapshot = OptionsSnapshot {
            version: BuildInfo::current().version,
            config: self.state.config.clone(),
            slots: self.state.directory.snapshot(),
            new_player,
        };
        tracing::debug!(new_player = ?new_player, "Sending options");
        self.broadcast(&MessageBody::Options(snapshot))
    }

    fn options_changed(&mut self) -> Result<(), SessionError> {
        self.game.apply_session_config(&self.state.config);
        self.send_options(None)
    }

    /// Edit the configuration and resend it to everyone
    pub fn update_config<F>(&mut self, edit: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut SessionConfig),
    {
        self.require_host()?;
        if self.state.in_game() {
            return Err(SessionError::GameInProgress);
        }
        edit(&mut self.state.config);
        self.state.config.sanitize();
        self.options_changed()
    }

    /// Set a slot's colour if no other human uses it. Returns whether it was
    /// applied.
    pub fn set_slot_colour(&mut self, slot: usize, colour: u8) -> Result<bool, SessionError> {
        self.require_host()?;
        if !self.state.directory.safe_to_use_colour(slot, colour) {
            return Ok(false);
        }
        let entry = self
            .state
            .directory
            .entry_mut(slot)
            .ok_or(SessionError::InvalidSlot(slot))?;
        entry.colour = colour;
        self.options_changed()?;
        Ok(true)
    }

    pub fn set_slot_team(&mut self, slot: usize, team: u8) -> Result<(), SessionError> {
        self.require_host()?;
        let entry = self
            .state
            .directory
            .entry_mut(slot)
            .ok_or(SessionError::InvalidSlot(slot))?;
        entry.team = team;
        self.options_changed()
    }

    /// Difficulty of an AI or empty slot
    pub fn set_slot_difficulty(&mut self, slot: usize, difficulty: u8) -> Result<(), SessionError> {
        self.require_host()?;
        if self.state.directory.is_human(slot) {
            return Err(SessionError::InvalidSlot(slot));
        }
        let entry = self
            .state
            .directory
            .entry_mut(slot)
            .ok_or(SessionError::InvalidSlot(slot))?;
        entry.difficulty = difficulty;
        self.options_changed()
    }

    /// Put an AI player into an empty slot
    pub fn set_ai_slot(&mut self, slot: usize, difficulty: u8) -> Result<(), SessionError> {
        self.require_host()?;
        if self.state.in_game() {
            return Err(SessionError::GameInProgress);
        }
        self.state.directory.set_ai(slot, difficulty)?;
        self.state.directory.set_name(slot, &format!("AI {slot}"));
        tracing::info!(slot, difficulty, "AI player added");
        self.options_changed()
    }

    pub fn set_structure_limit(&mut self, structure_id: u32, limit: u32) -> Result<(), SessionError> {
        self.require_host()?;
        self.state.config.set_structure_limit(structure_id, limit)?;
        self.options_changed()
    }

    // ========================================================================
    // Requests from clients
    // ========================================================================

    pub(super) fn recv_version_check(
        &mut self,
        from: PeerHandle,
        message: VersionCheck,
    ) -> Result<(), SessionError> {
        if !self.state.is_host() {
            return Ok(());
        }
        let slot = message.slot as usize;
        if !self.state.verify_sender(from, slot) {
            tracing::warn!(peer = %from, slot, "Version check for a slot the peer does not own");
            return Ok(());
        }

        let local = BuildInfo::current();
        let Err(mismatch) = local.validate_compatibility(message.build.build_hash) else {
            tracing::debug!(slot, version = %message.build.version, "Version check passed");
            return Ok(());
        };

        let name = self.state.slot_name(slot);
        tracing::warn!(slot, %mismatch, remote = %message.build.version, "Build mismatch");
        let warning = format!(
            "{name} is running version {} which differs from the host's {}",
            message.build.version, local.version
        );
        self.console.notice(warning.clone());
        if let Some(host_slot) = self.state.my_slot {
            self.broadcast(&MessageBody::Text(TextMessage {
                from: host_slot as u8,
                private: false,
                text: warning,
            }))?;
        }

        if self.kick_on_version_mismatch {
            self.kick(slot, KickReason::VersionMismatch)?;
        }
        Ok(())
    }

    pub(super) fn recv_colour_request(
        &mut self,
        from: PeerHandle,
        message: ColourRequest,
    ) -> Result<(), SessionError> {
        let slot = message.slot as usize;
        if !self.accept_request(from, slot) {
            return Ok(());
        }
        if !self.set_slot_colour(slot, message.colour)? {
            tracing::debug!(slot, colour = message.colour, "Colour already taken");
        }
        Ok(())
    }

    pub(super) fn recv_team_request(
        &mut self,
        from: PeerHandle,
        message: TeamRequest,
    ) -> Result<(), SessionError> {
        let slot = message.slot as usize;
        if !self.accept_request(from, slot) {
            return Ok(());
        }
        self.set_slot_team(slot, message.team)
    }

    pub(super) fn recv_ready_request(
        &mut self,
        from: PeerHandle,
        message: ReadyRequest,
    ) -> Result<(), SessionError> {
        let slot = message.slot as usize;
        if !self.accept_request(from, slot) {
            return Ok(());
        }
        if let Some(entry) = self.state.directory.entry_mut(slot) {
            entry.ready = message.ready;
        }
        tracing::info!(slot, ready = message.ready, "Player ready state changed");
        self.send_options(None)
    }

    /// Lobby requests are only honoured by the host, in the lobby, for the
    /// sender's own slot
    fn accept_request(&self, from: PeerHandle, slot: usize) -> bool {
        if !self.state.is_host() || self.state.phase != SessionPhase::Lobby {
            return false;
        }
        if !self.state.verify_sender(from, slot) {
            tracing::warn!(peer = %from, slot, "Request for a slot the peer does not own");
            return false;
        }
        true
    }

    // ========================================================================
    // Map serving
    // ========================================================================

    pub(super) fn recv_map_request(
        &mut self,
        from: PeerHandle,
        message: MapRequest,
    ) -> Result<(), SessionError> {
        if !self.state.is_host() {
            return Ok(());
        }
        if self.state.directory.find(from).is_none() {
            tracing::warn!(peer = %from, "Map request from a peer without a slot");
            return Ok(());
        }
        let name = validate_file_name(&message.map)?;
        let path = self.maps_dir.join(name);
        if self.sender.request_file(from, &path)? {
            self.console.notice(format!("Sending map {name}"));
        }
        Ok(())
    }

    /// Advance the outgoing transfer and the client's retry timer
    pub(super) fn tick_transfers(&mut self) -> Result<(), SessionError> {
        self.tick_map_request()?;

        let Some(outgoing) = self.sender.continue_transfer(self.now)? else {
            return Ok(());
        };
        let finished = outgoing.percent == 100;
        let name = outgoing.chunk.name.clone();
        let target = outgoing.target;

        if let Err(e) = self.send_to(target, &MessageBody::FileChunk(outgoing.chunk)) {
            self.sender.cancel_for(target);
            return Err(e);
        }
        tracing::trace!(peer = %target, file = %name, percent = outgoing.percent, "Sent file chunk");

        if finished {
            self.events.push_back(NetEvent::MapSent { name, peer: target });
        }
        Ok(())
    }
}
