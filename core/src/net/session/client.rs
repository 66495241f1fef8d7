//! Client side of options sync and map download, plus lobby requests and
//! ping handling shared by both roles

use skirmish_shared::{BuildInfo, MAX_SLOTS};

use super::{NetSession, PendingMapRequest};
use crate::net::files::ReceiveProgress;
use crate::net::game::GameStateMutator;
use crate::net::messages::{
    ColourRequest, FileChunk, JoinRejected, MapRequest, MessageBody, OptionsSnapshot, PingPayload,
    PlayerResponding, ReadyRequest, TeamRequest, VersionCheck,
};
use crate::net::transport::Transport;
use crate::net::types::{NetEvent, PeerHandle, SessionError, SessionPhase};

impl<T: Transport, G: GameStateMutator> NetSession<T, G> {
    // ========================================================================
    // Options
    // ========================================================================

    /// Overwrite the cached configuration and slot table
    pub(super) fn recv_options(&mut self, from: PeerHandle, snapshot: OptionsSnapshot) -> Result<(), SessionError> {
        if self.state.is_host() || !self.from_host(from) {
            tracing::warn!(peer = %from, "Options from a non-host peer");
            return Ok(());
        }

        let local_version = BuildInfo::current().version;
        if snapshot.version != local_version && !self.state.version_warned {
            tracing::warn!(local = %local_version, remote = %snapshot.version, "Host runs a different version");
            self.console.notice(format!(
                "Host is running version {}, this is {}",
                snapshot.version, local_version
            ));
            self.events.push_back(NetEvent::VersionMismatch {
                local: local_version,
                remote: snapshot.version.clone(),
            });
            self.state.version_warned = true;
        }

        let first = !self.state.options_received;
        let previous = self.state.directory.clone();
        self.state.config = snapshot.config;
        self.state.config.sanitize();
        self.state.directory.apply_snapshot(&snapshot.slots);
        self.state.options_received = true;

        // Proxies for every remote human this peer has not seen before
        for slot in 0..MAX_SLOTS {
            let peer = self.state.directory.peer(slot);
            let known = if first { None } else { previous.peer(slot) };
            if peer.is_some() && peer != known && peer != Some(self.state.me) {
                self.game.spawn_remote_proxy(slot);
                if !first {
                    let name = self.state.slot_name(slot);
                    self.console.notice(format!("{name} joined the game"));
                    self.events.push_back(NetEvent::PlayerJoined { slot, name });
                }
            }
        }

        self.game.apply_session_config(&self.state.config);
        self.events.push_back(NetEvent::OptionsUpdated);
        tracing::debug!(new_player = ?snapshot.new_player, "Options applied");

        let assigned = self.state.directory.find(self.state.me);
        if assigned.is_some() && assigned != self.state.my_slot {
            self.state.my_slot = assigned;
            if let Some(slot) = assigned {
                self.on_slot_assigned(slot)?;
            }
        }

        if !self.levels.has_map(&self.state.config) {
            let file = self.state.config.map_file_name();
            let pending = self.map_request.as_ref().is_some_and(|r| r.file == file);
            if !pending {
                self.request_map(file)?;
            }
        }
        Ok(())
    }

    /// Acknowledge the slot and present our build for checking
    fn on_slot_assigned(&mut self, slot: usize) -> Result<(), SessionError> {
        tracing::info!(slot, "Slot assigned");
        self.console.notice(format!("You are player {slot}"));
        self.events.push_back(NetEvent::SlotAssigned { slot });

        self.state.directory.mark_active(slot);
        self.broadcast(&MessageBody::PlayerResponding(PlayerResponding { slot: slot as u8 }))?;
        self.send_to_host(&MessageBody::VersionCheck(VersionCheck {
            slot: slot as u8,
            build: BuildInfo::current(),
        }))
    }

    pub(super) fn recv_join_rejected(&mut self, from: PeerHandle, message: JoinRejected) -> Result<(), SessionError> {
        if self.state.is_host() || !self.from_host(from) {
            return Ok(());
        }
        tracing::warn!(reason = ?message.reason, "Host rejected connection");
        self.console.notice(format!("Connection refused ({:?})", message.reason));
        self.events.push_back(NetEvent::JoinRejected(message.reason));
        self.close_session();
        Ok(())
    }

    pub(super) fn recv_fire_up(&mut self, from: PeerHandle) -> Result<(), SessionError> {
        if self.state.is_host() || !self.from_host(from) {
            tracing::warn!(peer = %from, "Start signal from a non-host peer");
            return Ok(());
        }
        if self.state.phase != SessionPhase::Lobby {
            return Ok(());
        }
        self.state.phase = SessionPhase::InGame;
        self.state.admission_open = false;
        self.console.notice("Game started");
        self.events.push_back(NetEvent::GameStarted);
        tracing::info!("Game started by host");
        Ok(())
    }

    // ========================================================================
    // Lobby requests
    // ========================================================================

    /// Ask for a colour. The host applies its own choice directly.
    pub fn request_colour(&mut self, colour: u8) -> Result<(), SessionError> {
        let slot = self.require_slot()?;
        if self.state.is_host() {
            self.set_slot_colour(slot, colour)?;
            return Ok(());
        }
        self.send_to_host(&MessageBody::ColourRequest(ColourRequest {
            slot: slot as u8,
            colour,
        }))
    }

    pub fn request_team(&mut self, team: u8) -> Result<(), SessionError> {
        let slot = self.require_slot()?;
        if self.state.is_host() {
            return self.set_slot_team(slot, team);
        }
        self.send_to_host(&MessageBody::TeamRequest(TeamRequest {
            slot: slot as u8,
            team,
        }))
    }

    pub fn set_ready(&mut self, ready: bool) -> Result<(), SessionError> {
        let slot = self.require_slot()?;
        if self.state.is_host() {
            if let Some(entry) = self.state.directory.entry_mut(slot) {
                entry.ready = ready;
            }
            return self.send_options(None);
        }
        self.send_to_host(&MessageBody::ReadyRequest(ReadyRequest {
            slot: slot as u8,
            ready,
        }))
    }

    /// Ready flag of the local slot as last known
    pub fn is_ready(&self) -> bool {
        self.state
            .my_slot
            .and_then(|slot| self.state.directory.entry(slot))
            .is_some_and(|e| e.ready)
    }

    // ========================================================================
    // Map download
    // ========================================================================

    fn request_map(&mut self, file: String) -> Result<(), SessionError> {
        tracing::info!(file = %file, "Requesting map from host");
        self.console.notice(format!("Map {file} missing, requesting it from the host"));
        self.send_to_host(&MessageBody::RequestMap(MapRequest { map: file.clone() }))?;
        self.map_request = Some(PendingMapRequest {
            file,
            last_activity: self.now,
        });
        Ok(())
    }

    /// Restart a stalled download from scratch
    pub(super) fn tick_map_request(&mut self) -> Result<(), SessionError> {
        let Some(request) = self.map_request.as_ref() else {
            return Ok(());
        };
        if self.now.saturating_duration_since(request.last_activity) <= self.request_timeout {
            return Ok(());
        }
        let file = request.file.clone();
        tracing::warn!(file = %file, "Map transfer stalled, requesting again");
        self.receiver.abort();
        self.request_map(file)
    }

    pub(super) fn recv_file_chunk(&mut self, from: PeerHandle, chunk: FileChunk) -> Result<(), SessionError> {
        if self.state.is_host() || !self.from_host(from) {
            tracing::warn!(peer = %from, "File chunk from a non-host peer");
            return Ok(());
        }

        let progress = self.receiver.receive_chunk(&chunk, self.now)?;
        if let Some(request) = self.map_request.as_mut() {
            if request.file == chunk.name {
                request.last_activity = self.now;
            }
        }

        match progress {
            ReceiveProgress::InProgress { name, percent } => {
                tracing::debug!(file = %name, percent, "Map download progress");
                self.console.notice(format!("Downloading {name}: {percent}%"));
                self.events.push_back(NetEvent::MapProgress { name, percent });
            }
            ReceiveProgress::Complete { name, path } => {
                tracing::info!(file = %name, path = %path.display(), "Map downloaded");
                if let Err(e) = self.levels.rebuild() {
                    tracing::warn!(error = %e, "Failed to rebuild level list");
                }
                if self.map_request.as_ref().is_some_and(|r| r.file == name) {
                    self.map_request = None;
                }
                self.console.notice(format!("Map {name} received"));
                self.events.push_back(NetEvent::MapProgress {
                    name: name.clone(),
                    percent: 100,
                });
                self.events.push_back(NetEvent::MapReceived { name });
            }
        }
        Ok(())
    }

    // ========================================================================
    // Ping
    // ========================================================================

    pub(super) fn recv_ping(&mut self, from: PeerHandle, message: PingPayload) -> Result<(), SessionError> {
        self.send_to(from, &MessageBody::Pong(message))
    }

    pub(super) fn recv_pong(&mut self, from: PeerHandle, message: PingPayload) -> Result<(), SessionError> {
        let Some(slot) = self.state.directory.find(from) else {
            return Ok(());
        };
        let rtt = self.elapsed_ms().saturating_sub(message.sent_ms);
        if let Some(entry) = self.state.directory.entry_mut(slot) {
            entry.last_ping_ms = rtt.min(u32::MAX as u64) as u32;
        }
        tracing::trace!(slot, rtt_ms = rtt, "Pong");
        Ok(())
    }
}
