//! Session tests over the loopback transport

use std::path::Path;
use std::time::{Duration, Instant};

use skirmish_shared::{BuildInfo, MAX_SLOTS, MAX_STRUCTURE_LIMITS, MIN_PLAYERS};

use super::*;
use crate::net::codec::{Codec, MessageType};
use crate::net::game::RecordingGame;
use crate::net::messages::{
    LeavingNotice, NewPlayer, OptionsSnapshot, PingPayload, PowerLevel, TextMessage, VersionCheck,
};
use crate::net::msg_queue::{DeferredEvent, DeferredKind};
use crate::net::transport::{LoopbackHub, LoopbackTransport, Transport, TransportEvent};
use crate::net::types::{KickReason, LeaveReason, RejectReason};

type Session = NetSession<LoopbackTransport, RecordingGame>;

const ROUNDS: usize = 10;

fn net_config(maps: &Path) -> NetConfig {
    let mut config = NetConfig::default();
    config.transfer.maps_dir = maps.to_path_buf();
    config.transfer.send_interval_ms = 0;
    config.transfer.chunk_size = 1000;
    config
}

fn lobby_config(max_players: u8) -> SessionConfig {
    SessionConfig {
        max_players,
        ..SessionConfig::default()
    }
}

fn wire(body: &MessageBody) -> Vec<u8> {
    Codec::plain().encode(&body.to_envelope().unwrap())
}

fn drain_bodies(transport: &mut LoopbackTransport) -> Vec<MessageBody> {
    let mut bodies = Vec::new();
    while let Some(event) = transport.receive_one() {
        if let TransportEvent::Message { bytes, .. } = event {
            let envelope = Codec::plain().decode(&bytes).unwrap();
            bodies.push(MessageBody::from_envelope(&envelope).unwrap());
        }
    }
    bodies
}

fn count(events: &[NetEvent], wanted: &NetEvent) -> usize {
    events.iter().filter(|e| *e == wanted).count()
}

#[derive(Debug, Default)]
struct Pumped {
    host: Vec<NetEvent>,
    clients: Vec<Vec<NetEvent>>,
}

/// A host session plus any number of client sessions on one hub
struct Lobby {
    hub: LoopbackHub,
    net: NetConfig,
    host: Session,
    clients: Vec<Session>,
    _maps: tempfile::TempDir,
}

impl Lobby {
    /// Host and clients share one maps directory that holds the map
    fn new(max_players: u8) -> Self {
        let maps = tempfile::tempdir().unwrap();
        let file = lobby_config(max_players).map_file_name();
        std::fs::write(maps.path().join(file), b"map data").unwrap();
        Self::with_maps(max_players, maps)
    }

    fn with_maps(max_players: u8, maps: tempfile::TempDir) -> Self {
        let net = net_config(maps.path());
        let hub = LoopbackHub::new();
        let transport = hub.connect_as_host().unwrap();
        let mut host = Session::host(
            transport,
            RecordingGame::default(),
            lobby_config(max_players),
            &net,
            "Host",
        )
        .unwrap();
        host.set_rng_seed(7);

        Self {
            hub,
            net,
            host,
            clients: Vec::new(),
            _maps: maps,
        }
    }

    /// Connect a client, settle the admission and return its events
    fn join(&mut self, name: &str) -> Vec<NetEvent> {
        let net = self.net.clone();
        self.join_with(name, &net)
    }

    fn join_with(&mut self, name: &str, net: &NetConfig) -> Vec<NetEvent> {
        let transport = self.hub.connect_as_client(name).unwrap();
        let client = Session::join(transport, RecordingGame::default(), net, name).unwrap();
        self.clients.push(client);
        self.pump().clients.pop().unwrap_or_default()
    }

    fn pump(&mut self) -> Pumped {
        let mut pumped = Pumped {
            host: Vec::new(),
            clients: vec![Vec::new(); self.clients.len()],
        };
        for _ in 0..ROUNDS {
            pumped.host.extend(self.host.poll());
            for (client, events) in self.clients.iter_mut().zip(pumped.clients.iter_mut()) {
                events.extend(client.poll());
            }
        }
        pumped
    }

    fn slot_of(&self, client: usize) -> usize {
        self.clients[client].my_slot().unwrap()
    }
}

// ============================================================================
// Admission
// ============================================================================

#[test]
fn test_host_occupies_slot_zero() {
    let lobby = Lobby::new(4);
    assert_eq!(lobby.host.my_slot(), Some(0));
    assert_eq!(lobby.host.role(), Role::Host);
    assert_eq!(lobby.host.directory().peer(0), Some(lobby.host.local_peer()));
    assert!(lobby.host.directory().all_humans_ready());
    assert_eq!(lobby.host.game().last_config(), Some(lobby.host.config()));
}

#[test]
fn test_four_player_lobby_end_to_end() {
    let mut lobby = Lobby::new(4);

    for (joined, name) in ["Alpha", "Bravo", "Charlie"].into_iter().enumerate() {
        let transport = lobby.hub.connect_as_client(name).unwrap();
        let net = lobby.net.clone();
        lobby
            .clients
            .push(Session::join(transport, RecordingGame::default(), &net, name).unwrap());

        let pumped = lobby.pump();
        assert_eq!(pumped.clients.len(), joined + 1);
        for events in &pumped.clients {
            assert_eq!(count(events, &NetEvent::OptionsUpdated), 1, "one broadcast per admission");
        }
        let joins = pumped
            .host
            .iter()
            .filter(|e| matches!(e, NetEvent::PlayerJoined { .. }))
            .count();
        assert_eq!(joins, 1);
    }

    // Everyone agrees on the table and the slots are distinct
    let table = lobby.host.directory().snapshot();
    let mut slots = Vec::new();
    for client in &lobby.clients {
        assert_eq!(client.directory().snapshot(), table);
        let slot = client.my_slot().unwrap();
        assert_eq!(lobby.host.directory().find(client.local_peer()), Some(slot));
        assert!(slot > 0 && slot < 4);
        slots.push(slot);
        assert_eq!(client.game().spawned().len(), 3);
    }
    slots.sort_unstable();
    slots.dedup();
    assert_eq!(slots.len(), 3);

    // Client #2 drops without a word
    let dropped = lobby.clients.remove(1);
    let slot = dropped.my_slot().unwrap();
    drop(dropped);
    let pumped = lobby.pump();

    assert_eq!(lobby.host.game().cleared(), vec![slot]);
    assert!(pumped.host.contains(&NetEvent::PlayerLeft {
        slot,
        reason: LeaveReason::Dropped
    }));
    for client in &lobby.clients {
        assert_eq!(client.game().cleared(), vec![slot]);
        assert!(client.directory().entry(slot).unwrap().is_empty());
        assert_eq!(client.phase(), SessionPhase::Lobby);
    }

    // Host is still the authority
    lobby
        .host
        .update_config(|config| {
            config.fog_enabled = false;
            config.power_level = PowerLevel::High;
        })
        .unwrap();
    let pumped = lobby.pump();
    for (client, events) in lobby.clients.iter().zip(&pumped.clients) {
        assert_eq!(count(events, &NetEvent::OptionsUpdated), 1);
        assert_eq!(client.config(), lobby.host.config());
        assert_eq!(client.game().last_config(), Some(lobby.host.config()));
    }
}

#[test]
fn test_full_session_kicks_newcomer() {
    let mut lobby = Lobby::new(2);
    let events = lobby.join("Alpha");
    assert!(events.iter().any(|e| matches!(e, NetEvent::SlotAssigned { slot: 1 })));

    let events = lobby.join("Bravo");
    assert!(events.contains(&NetEvent::Kicked(KickReason::SessionFull)));
    assert_eq!(lobby.clients[1].phase(), SessionPhase::Closed);
    assert_eq!(lobby.host.directory().occupied_count(), 2);
    assert_eq!(lobby.clients[0].directory().occupied_count(), 2);
}

#[test]
fn test_ai_counts_towards_player_cap() {
    let mut lobby = Lobby::new(2);
    lobby.host.set_ai_slot(1, 10).unwrap();

    let events = lobby.join("Alpha");
    assert!(events.contains(&NetEvent::Kicked(KickReason::SessionFull)));
    assert_eq!(lobby.host.directory().occupied_count(), 2);
    assert!(lobby.host.directory().is_ai(1));
}

#[test]
fn test_every_slot_taken_kicks_newcomer() {
    let mut lobby = Lobby::new(MAX_SLOTS as u8);
    for slot in 1..MAX_SLOTS {
        lobby.host.set_ai_slot(slot, 10).unwrap();
    }

    let events = lobby.join("Extra");
    assert!(events.contains(&NetEvent::Kicked(KickReason::SessionFull)));
    assert!(!events.iter().any(|e| matches!(e, NetEvent::JoinRejected(_))));
    assert_eq!(lobby.clients[0].phase(), SessionPhase::Closed);
    assert_eq!(lobby.clients[0].my_slot(), None);
    assert_eq!(lobby.host.directory().occupied_count(), MAX_SLOTS);
    assert_eq!(lobby.host.directory().human_count(), 1);
}

#[test]
fn test_player_cap_clamped_on_update() {
    let mut lobby = Lobby::new(4);
    lobby.host.update_config(|config| config.max_players = 0).unwrap();
    assert_eq!(lobby.host.config().max_players, MIN_PLAYERS);

    let events = lobby.join("Alpha");
    assert!(events.contains(&NetEvent::SlotAssigned { slot: 1 }));
    assert_eq!(lobby.clients[0].config().max_players, MIN_PLAYERS);

    lobby.host.update_config(|config| config.max_players = u8::MAX).unwrap();
    assert_eq!(lobby.host.config().max_players, MAX_SLOTS as u8);
}

#[test]
fn test_late_join_rejected() {
    let mut lobby = Lobby::new(4);
    lobby.join("Alpha");
    lobby.clients[0].set_ready(true).unwrap();
    lobby.pump();
    lobby.host.start_game().unwrap();

    let events = lobby.join("Late");
    assert_eq!(events, vec![NetEvent::JoinRejected(RejectReason::GameInProgress)]);
    assert_eq!(lobby.clients[1].phase(), SessionPhase::Closed);
    assert_eq!(lobby.host.directory().human_count(), 2);
}

#[test]
fn test_halt_admission() {
    let mut lobby = Lobby::new(4);
    lobby.join("Alpha");
    assert!(matches!(lobby.clients[0].halt_admission(), Err(SessionError::NotHost)));

    lobby.host.halt_admission().unwrap();
    assert!(!lobby.host.is_admission_open());

    let events = lobby.join("Bravo");
    assert_eq!(events, vec![NetEvent::JoinRejected(RejectReason::AdmissionClosed)]);
    // Existing connections are untouched
    assert_eq!(lobby.clients[0].phase(), SessionPhase::Lobby);
    assert_eq!(lobby.host.directory().human_count(), 2);
}

#[test]
fn test_start_requires_everyone_ready() {
    let mut lobby = Lobby::new(4);
    lobby.join("Alpha");
    assert!(matches!(lobby.host.start_game(), Err(SessionError::NotAllReady)));

    lobby.clients[0].set_ready(true).unwrap();
    lobby.pump();
    assert!(lobby.clients[0].is_ready());
    assert!(lobby.host.directory().all_humans_ready());

    lobby.host.start_game().unwrap();
    let pumped = lobby.pump();
    assert!(pumped.clients[0].contains(&NetEvent::GameStarted));
    assert_eq!(lobby.clients[0].phase(), SessionPhase::InGame);
    assert!(!lobby.host.is_admission_open());
    assert!(matches!(lobby.host.start_game(), Err(SessionError::GameInProgress)));
}

// ============================================================================
// Leaving
// ============================================================================

#[test]
fn test_graceful_leave_is_idempotent() {
    let mut lobby = Lobby::new(4);
    lobby.join("Alpha");
    lobby.join("Bravo");
    let slot = lobby.slot_of(0);

    lobby.clients[0].leave().unwrap();
    assert_eq!(lobby.clients[0].phase(), SessionPhase::Closed);
    let pumped = lobby.pump();

    let left = NetEvent::PlayerLeft {
        slot,
        reason: LeaveReason::Graceful,
    };
    assert_eq!(count(&pumped.host, &left), 1);
    assert_eq!(count(&pumped.clients[1], &left), 1);
    assert_eq!(lobby.host.game().cleared(), vec![slot]);
    assert_eq!(lobby.clients[1].game().cleared(), vec![slot]);

    // A duplicate notice for the now empty slot changes nothing
    let notice = wire(&MessageBody::Leaving(LeavingNotice {
        slot: slot as u8,
        host: false,
    }));
    let bravo = lobby.clients[1].local_peer();
    assert!(lobby.hub.inject(bravo, lobby.host.local_peer(), notice));
    let pumped = lobby.pump();

    assert_eq!(count(&pumped.clients[1], &left), 0);
    assert_eq!(lobby.clients[1].game().cleared(), vec![slot]);
}

#[test]
fn test_host_leaving_ends_session() {
    let mut lobby = Lobby::new(4);
    lobby.join("Alpha");
    lobby.join("Bravo");

    lobby.host.leave().unwrap();
    assert_eq!(lobby.host.phase(), SessionPhase::Closed);
    let pumped = lobby.pump();

    for (client, events) in lobby.clients.iter().zip(&pumped.clients) {
        assert_eq!(count(events, &NetEvent::HostLeft), 1);
        assert_eq!(client.phase(), SessionPhase::Closed);
        assert!(client.game().cleared().contains(&0));
    }
}

#[test]
fn test_moderator_kick() {
    let mut lobby = Lobby::new(4);
    lobby.join("Alpha");
    lobby.join("Bravo");
    let victim = lobby.slot_of(0);

    assert!(matches!(
        lobby.host.kick(0, KickReason::Moderator),
        Err(SessionError::CannotKickSelf)
    ));
    assert!(matches!(
        lobby.host.kick(6, KickReason::Moderator),
        Err(SessionError::NotHuman(6))
    ));
    assert!(matches!(
        lobby.clients[1].kick(victim, KickReason::Moderator),
        Err(SessionError::NotHost)
    ));

    lobby.host.kick(victim, KickReason::Moderator).unwrap();
    let pumped = lobby.pump();

    assert!(pumped.clients[0].contains(&NetEvent::Kicked(KickReason::Moderator)));
    assert_eq!(lobby.clients[0].phase(), SessionPhase::Closed);
    assert!(pumped.clients[1].contains(&NetEvent::PlayerLeft {
        slot: victim,
        reason: LeaveReason::Kicked(KickReason::Moderator)
    }));
    assert_eq!(lobby.clients[1].game().cleared(), vec![victim]);
    assert_eq!(lobby.host.game().cleared(), vec![victim]);
}

// ============================================================================
// Fault handling
// ============================================================================

#[test]
fn test_malformed_envelopes_dropped() {
    let mut lobby = Lobby::new(4);
    lobby.join("Alpha");
    let alpha = lobby.clients[0].local_peer();
    let slot = lobby.slot_of(0);
    let host = lobby.host.local_peer();

    lobby.hub.inject(host, alpha, vec![0xFF, 0, 0]);
    lobby.hub.inject(host, alpha, vec![MessageType::Text.tag(), 50, 0, 1, 2]);
    lobby.hub.inject(host, alpha, vec![MessageType::Options.tag(), 2, 0, 0xDE, 0xAD]);
    lobby.hub.inject(
        host,
        alpha,
        wire(&MessageBody::Text(TextMessage {
            from: slot as u8,
            private: false,
            text: "still here".to_string(),
        })),
    );

    let pumped = lobby.pump();
    assert!(pumped.host.contains(&NetEvent::TextReceived {
        from_slot: slot,
        text: "still here".to_string(),
        private: false
    }));
    assert_eq!(lobby.host.phase(), SessionPhase::Lobby);
    assert_eq!(lobby.host.directory().human_count(), 2);
}

#[test]
fn test_build_mismatch_kicks() {
    let mut lobby = Lobby::new(4);
    lobby.join("Alpha");
    let alpha = lobby.clients[0].local_peer();
    let slot = lobby.slot_of(0);

    let check = wire(&MessageBody::VersionCheck(VersionCheck {
        slot: slot as u8,
        build: BuildInfo::new("99.0.0", 99),
    }));
    lobby.hub.inject(lobby.host.local_peer(), alpha, check);
    let pumped = lobby.pump();

    let warned = pumped.clients[0]
        .iter()
        .any(|e| matches!(e, NetEvent::TextReceived { from_slot: 0, .. }));
    assert!(warned);
    assert!(pumped.clients[0].contains(&NetEvent::Kicked(KickReason::VersionMismatch)));
    assert_eq!(lobby.host.directory().human_count(), 1);
}

#[test]
fn test_spoofed_slot_ignored() {
    let mut lobby = Lobby::new(4);
    lobby.join("Alpha");
    let alpha = lobby.clients[0].local_peer();

    // Alpha pretends to be the host
    let text = wire(&MessageBody::Text(TextMessage {
        from: 0,
        private: false,
        text: "I am the host".to_string(),
    }));
    lobby.hub.inject(lobby.host.local_peer(), alpha, text);
    let pumped = lobby.pump();

    assert!(!pumped.host.iter().any(|e| matches!(e, NetEvent::TextReceived { .. })));
}

// ============================================================================
// Options
// ============================================================================

#[test]
fn test_colour_request() {
    let mut lobby = Lobby::new(4);
    lobby.join("Alpha");
    let slot = lobby.slot_of(0);

    // Host already wears colour 0
    lobby.clients[0].request_colour(0).unwrap();
    lobby.pump();
    assert_eq!(lobby.host.directory().entry(slot).unwrap().colour, slot as u8);

    lobby.clients[0].request_colour(7).unwrap();
    lobby.pump();
    assert_eq!(lobby.host.directory().entry(slot).unwrap().colour, 7);
    assert_eq!(lobby.clients[0].directory().entry(slot).unwrap().colour, 7);
}

#[test]
fn test_team_request() {
    let mut lobby = Lobby::new(4);
    lobby.join("Alpha");
    let slot = lobby.slot_of(0);

    lobby.clients[0].request_team(0).unwrap();
    lobby.pump();
    assert_eq!(lobby.clients[0].directory().entry(slot).unwrap().team, 0);
    assert_eq!(lobby.host.directory().entry(slot).unwrap().team, 0);
}

#[test]
fn test_structure_limit_overflow() {
    let mut lobby = Lobby::new(4);
    for id in 0..MAX_STRUCTURE_LIMITS as u32 {
        lobby.host.set_structure_limit(id, 3).unwrap();
    }
    assert!(matches!(
        lobby.host.set_structure_limit(1000, 3),
        Err(SessionError::StructureLimitsFull)
    ));
    assert_eq!(lobby.host.config().structure_limits.len(), MAX_STRUCTURE_LIMITS);
}

/// Client attached to a bare host transport, for driving it by hand
struct Harness {
    _hub: LoopbackHub,
    host: LoopbackTransport,
    client: Session,
    _maps: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        let maps = tempfile::tempdir().unwrap();
        let hub = LoopbackHub::new();
        let mut host = hub.connect_as_host().unwrap();
        let transport = hub.connect_as_client("Alpha").unwrap();
        let client = Session::join(transport, RecordingGame::default(), &net_config(maps.path()), "Alpha").unwrap();
        // Swallow the connection event
        drain_bodies(&mut host);

        Self {
            _hub: hub,
            host,
            client,
            _maps: maps,
        }
    }

    fn send_options(&mut self, version: &str, slot: usize) {
        let mut directory = PeerDirectory::new();
        directory.claim(0, self.host.local_peer()).unwrap();
        directory.mark_active(0);
        directory.claim(slot, self.client.local_peer()).unwrap();

        let snapshot = OptionsSnapshot {
            version: version.to_string(),
            config: SessionConfig::default(),
            slots: directory.snapshot(),
            new_player: Some(NewPlayer {
                peer: self.client.local_peer(),
                slot: slot as u8,
            }),
        };
        let peer = self.client.local_peer();
        self.host
            .send_to(peer, &wire(&MessageBody::Options(snapshot)), true)
            .unwrap();
    }
}

#[test]
fn test_text_before_options_is_noop() {
    let mut harness = Harness::new();
    harness.client.send_text("hello", false).unwrap();
    harness.client.send_text("hello", true).unwrap();
    assert!(drain_bodies(&mut harness.host).is_empty());
    assert!(harness.client.drain_console().is_empty());
}

#[test]
fn test_options_version_mismatch_continues() {
    let mut harness = Harness::new();
    harness.send_options("0.0.0-other", 2);
    let events = harness.client.poll();

    assert!(events.contains(&NetEvent::VersionMismatch {
        local: BuildInfo::current().version,
        remote: "0.0.0-other".to_string()
    }));
    assert!(events.contains(&NetEvent::SlotAssigned { slot: 2 }));
    assert!(events.contains(&NetEvent::OptionsUpdated));
    assert_eq!(harness.client.phase(), SessionPhase::Lobby);
    assert_eq!(harness.client.game().spawned(), vec![0]);

    // Warned once only
    harness.send_options("0.0.0-other", 2);
    let events = harness.client.poll();
    assert!(!events.iter().any(|e| matches!(e, NetEvent::VersionMismatch { .. })));
}

#[test]
fn test_slot_acknowledged_and_build_presented() {
    let mut harness = Harness::new();
    harness.send_options(&BuildInfo::current().version, 3);
    harness.client.poll();

    let bodies = drain_bodies(&mut harness.host);
    assert!(bodies.contains(&MessageBody::PlayerResponding(
        crate::net::messages::PlayerResponding { slot: 3 }
    )));
    assert!(bodies.contains(&MessageBody::VersionCheck(VersionCheck {
        slot: 3,
        build: BuildInfo::current(),
    })));
    assert!(!harness.client.state().is_joining());
}

#[test]
fn test_stalled_map_request_retried() {
    let mut harness = Harness::new();
    let start = Instant::now();
    harness.send_options(&BuildInfo::current().version, 1);
    harness.client.poll_at(start);

    let map_requests = |bodies: Vec<MessageBody>| {
        bodies
            .into_iter()
            .filter(|b| matches!(b, MessageBody::RequestMap(_)))
            .count()
    };
    assert_eq!(map_requests(drain_bodies(&mut harness.host)), 1);
    assert!(harness.client.is_awaiting_map());

    harness.client.poll_at(start + Duration::from_secs(5));
    assert_eq!(map_requests(drain_bodies(&mut harness.host)), 0);

    harness.client.poll_at(start + Duration::from_secs(11));
    assert_eq!(map_requests(drain_bodies(&mut harness.host)), 1);
}

// ============================================================================
// File distribution
// ============================================================================

fn host_with_map(len: usize) -> (Lobby, Vec<u8>) {
    let maps = tempfile::tempdir().unwrap();
    let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    std::fs::write(maps.path().join(lobby_config(4).map_file_name()), &bytes).unwrap();
    (Lobby::with_maps(4, maps), bytes)
}

#[test]
fn test_map_transfer_to_joiner() {
    let (mut lobby, original) = host_with_map(3500);
    let client_maps = tempfile::tempdir().unwrap();
    let events = lobby.join_with("Alpha", &net_config(client_maps.path()));

    let name = lobby_config(4).map_file_name();
    assert!(events.contains(&NetEvent::MapReceived { name: name.clone() }));
    let last_progress = events.iter().rev().find_map(|e| match e {
        NetEvent::MapProgress { percent, .. } => Some(*percent),
        _ => None,
    });
    assert_eq!(last_progress, Some(100));

    let received = std::fs::read(client_maps.path().join(&name)).unwrap();
    assert_eq!(received, original);

    let client = &lobby.clients[0];
    assert!(client.levels().has_map(client.config()));
    assert!(!client.is_awaiting_map());
    assert!(!lobby.host.is_sending_file());
}

#[test]
fn test_transfer_cancelled_when_peer_leaves() {
    let (mut lobby, _) = host_with_map(50_000);
    let client_maps = tempfile::tempdir().unwrap();
    lobby.join_with("Alpha", &net_config(client_maps.path()));
    assert!(lobby.host.is_sending_file());

    drop(lobby.clients.remove(0));
    lobby.pump();
    assert!(!lobby.host.is_sending_file());
}

// ============================================================================
// Chat and deferred events
// ============================================================================

#[test]
fn test_chat_addressing() {
    let mut lobby = Lobby::new(4);
    lobby.join("Alpha");
    lobby.join("Bravo");
    let alpha = lobby.slot_of(0);

    lobby.clients[0].send_text("0psst", false).unwrap();
    let pumped = lobby.pump();
    assert!(pumped.host.contains(&NetEvent::TextReceived {
        from_slot: alpha,
        text: "psst".to_string(),
        private: true
    }));
    assert!(!pumped.clients[1].iter().any(|e| matches!(e, NetEvent::TextReceived { .. })));

    let echoed = lobby.clients[0].drain_console();
    assert!(echoed.iter().any(|line| line.to_string() == "Alpha: (private) psst"));

    lobby.clients[0].send_text("hello all", false).unwrap();
    let pumped = lobby.pump();
    let expected = NetEvent::TextReceived {
        from_slot: alpha,
        text: "hello all".to_string(),
        private: false,
    };
    assert_eq!(count(&pumped.host, &expected), 1);
    assert_eq!(count(&pumped.clients[1], &expected), 1);

    // Broadcast-all sends the raw line, prefix included
    lobby.clients[0].send_text("3x", true).unwrap();
    let pumped = lobby.pump();
    assert!(pumped.clients[1].contains(&NetEvent::TextReceived {
        from_slot: alpha,
        text: "3x".to_string(),
        private: false
    }));
}

#[test]
fn test_closed_channel_skipped() {
    let mut lobby = Lobby::new(4);
    lobby.join("Alpha");
    let alpha = lobby.slot_of(0);

    lobby.host.router_mut().set_channel_open(alpha, false);
    lobby.host.send_text("anyone?", false).unwrap();
    let pumped = lobby.pump();
    assert!(!pumped.clients[0].iter().any(|e| matches!(e, NetEvent::TextReceived { .. })));
}

#[test]
fn test_ai_message_delivered_locally() {
    let mut lobby = Lobby::new(4);
    lobby.host.set_ai_slot(1, 10).unwrap();
    lobby.host.send_ai_message(1, "attack").unwrap();
    lobby.host.send_ai_message(1, "retreat").unwrap();
    assert_eq!(lobby.host.deferred().count(), 2);

    let mut fired: Vec<DeferredEvent> = Vec::new();
    assert_eq!(lobby.host.fire_deferred(&mut fired), 1);
    assert_eq!(lobby.host.fire_deferred(&mut fired), 1);
    assert_eq!(lobby.host.fire_deferred(&mut fired), 0);
    assert_eq!(
        fired,
        vec![
            DeferredEvent::ai_message(0, 1, "attack"),
            DeferredEvent::ai_message(0, 1, "retreat"),
        ]
    );
}

#[test]
fn test_ai_message_forwarded_to_responsible_peer() {
    let mut lobby = Lobby::new(4);
    lobby.join("Alpha");
    let alpha = lobby.slot_of(0);
    let ai = alpha + 1;
    lobby.host.set_ai_slot(ai, 10).unwrap();
    lobby.pump();

    lobby.host.send_ai_message(ai, "hold").unwrap();
    lobby.host.send_text(&format!("{ai}go"), false).unwrap();
    lobby.pump();

    let mut host_fired: Vec<DeferredEvent> = Vec::new();
    lobby.host.fire_deferred(&mut host_fired);
    assert!(host_fired.is_empty());

    let mut fired: Vec<DeferredEvent> = Vec::new();
    while lobby.clients[0].fire_deferred(&mut fired) > 0 {}
    assert_eq!(
        fired,
        vec![
            DeferredEvent::ai_message(0, ai, "hold"),
            DeferredEvent::ai_message(0, ai, "go"),
        ]
    );
}

#[test]
fn test_broadcast_all_reaches_ai_slots() {
    let mut lobby = Lobby::new(4);
    lobby.join("Alpha");
    let alpha = lobby.slot_of(0);
    let ai = (1..4).find(|&slot| slot != alpha).unwrap();
    lobby.host.set_ai_slot(ai, 10).unwrap();
    lobby.pump();

    // The channel being closed does not matter to a broadcast
    lobby.host.router_mut().set_channel_open(ai, false);
    lobby.host.send_text("attack", true).unwrap();
    lobby.pump();
    lobby.clients[0].send_text("retreat", true).unwrap();
    lobby.pump();

    let mut fired: Vec<DeferredEvent> = Vec::new();
    while lobby.host.fire_deferred(&mut fired) > 0 {}
    let mut alpha_fired: Vec<DeferredEvent> = Vec::new();
    while lobby.clients[0].fire_deferred(&mut alpha_fired) > 0 {}

    // Whoever simulates the AI receives both lines, once each
    let responsible = if ai < alpha { &fired } else { &alpha_fired };
    let other = if ai < alpha { &alpha_fired } else { &fired };
    assert_eq!(
        *responsible,
        vec![
            DeferredEvent::ai_message(0, ai, "attack"),
            DeferredEvent::ai_message(alpha, ai, "retreat"),
        ]
    );
    assert!(other.is_empty());
}

#[test]
fn test_beacon_to_host() {
    let mut lobby = Lobby::new(4);
    lobby.join("Alpha");
    let alpha = lobby.slot_of(0);

    lobby.clients[0].send_beacon(0, 10, 20, "here").unwrap();
    lobby.pump();

    let mut fired: Vec<DeferredEvent> = Vec::new();
    lobby.host.fire_deferred(&mut fired);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].kind, DeferredKind::Beacon);
    assert_eq!((fired[0].from_slot, fired[0].x, fired[0].y), (alpha, 10, 20));
}

#[test]
fn test_game_traffic_only_in_game() {
    let mut lobby = Lobby::new(4);
    lobby.join("Alpha");
    assert!(matches!(
        lobby.host.send_game_message(MessageType::Text, Vec::new()),
        Err(SessionError::NotGameTraffic(MessageType::Text))
    ));

    lobby.host.send_game_message(MessageType::Droid, vec![1, 2, 3]).unwrap();
    let pumped = lobby.pump();
    assert!(!pumped.clients[0].iter().any(|e| matches!(e, NetEvent::GameMessage { .. })));

    lobby.clients[0].set_ready(true).unwrap();
    lobby.pump();
    lobby.host.start_game().unwrap();
    lobby.pump();

    lobby.host.send_game_message(MessageType::Droid, vec![1, 2, 3]).unwrap();
    let pumped = lobby.pump();
    assert!(pumped.clients[0].contains(&NetEvent::GameMessage {
        from_slot: 0,
        kind: MessageType::Droid,
        payload: vec![1, 2, 3]
    }));
}

#[test]
fn test_ping_echoed() {
    let mut harness = Harness::new();
    let peer = harness.client.local_peer();
    let ping = wire(&MessageBody::Ping(PingPayload { sent_ms: 42 }));
    harness.host.send_to(peer, &ping, true).unwrap();
    harness.client.poll();

    let bodies = drain_bodies(&mut harness.host);
    assert_eq!(bodies, vec![MessageBody::Pong(PingPayload { sent_ms: 42 })]);
}
