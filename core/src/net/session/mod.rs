//! Session manager
//!
//! [`NetSession`] owns the explicit [`SessionState`] together with every
//! subsystem it drives: codec, transport, dispatch table, file transfer,
//! deferred queue, text router and console. One call to [`NetSession::poll`]
//! per tick drains the transport, dispatches each envelope synchronously,
//! advances the map transfer and returns the events raised along the way.
//!
//! Nothing here blocks. Waiting for options, for map data or for a peer to
//! finish joining is expressed as flags re-checked on later ticks.

mod chat;
mod client;
mod dispatch;
mod host;
mod leave;
mod state;

#[cfg(test)]
mod tests;

pub use state::SessionState;

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

use crate::config::NetConfig;
use crate::net::codec::Codec;
use crate::net::console::{ConsoleLine, ConsoleLog};
use crate::net::directory::PeerDirectory;
use crate::net::files::{FileReceiver, FileSender, LevelCache};
use crate::net::game::GameStateMutator;
use crate::net::messages::{MessageBody, SessionConfig};
use crate::net::msg_queue::{DeferredEventQueue, ScriptCallbacks};
use crate::net::text::TextRouter;
use crate::net::transport::{Transport, TransportEvent};
use crate::net::types::{NetEvent, PeerHandle, Role, SessionError, SessionPhase};
use dispatch::HandlerTable;

/// Outstanding map request on a client
#[derive(Debug, Clone)]
struct PendingMapRequest {
    file: String,
    /// Request time or the most recent chunk for it
    last_activity: Instant,
}

/// One multiplayer session, host or client
pub struct NetSession<T: Transport, G: GameStateMutator> {
    state: SessionState,
    transport: T,
    game: G,
    codec: Codec,
    rng: Pcg64Mcg,
    handlers: HandlerTable<T, G>,

    queue: DeferredEventQueue,
    events_per_tick: usize,
    router: TextRouter,
    console: ConsoleLog,

    sender: FileSender,
    receiver: FileReceiver,
    levels: LevelCache,
    maps_dir: PathBuf,
    map_request: Option<PendingMapRequest>,
    request_timeout: Duration,

    kick_on_version_mismatch: bool,
    ping_interval: Duration,
    last_ping: Option<Instant>,
    epoch: Instant,
    /// Time of the poll currently running
    now: Instant,

    events: VecDeque<NetEvent>,
}

impl<T: Transport, G: GameStateMutator> NetSession<T, G> {
    /// Open a lobby as the host
    ///
    /// The host occupies slot 0, is always ready and owns `config`.
    pub fn host(
        transport: T,
        mut game: G,
        mut config: SessionConfig,
        net: &NetConfig,
        name: &str,
    ) -> Result<Self, SessionError> {
        if !transport.is_host() {
            return Err(SessionError::NotHost);
        }
        config.sanitize();

        let me = transport.local_peer();
        let mut state = SessionState::new(Role::Host, me, name, config);
        state.directory.claim(0, me)?;
        state.directory.mark_active(0);
        state.directory.set_name(0, name);
        if let Some(entry) = state.directory.entry_mut(0) {
            entry.ready = true;
        }
        state.my_slot = Some(0);

        game.apply_session_config(&state.config);
        tracing::info!(peer = %me, map = %state.config.map_name, max_players = state.config.max_players, "Hosting session");

        Ok(Self::assemble(state, transport, game, net))
    }

    /// Enter a lobby as a client
    ///
    /// The slot and configuration arrive with the host's first options
    /// snapshot; until then sending chat is a no-op.
    pub fn join(transport: T, game: G, net: &NetConfig, name: &str) -> Result<Self, SessionError> {
        if transport.is_host() {
            return Err(SessionError::NotClient);
        }
        let me = transport.local_peer();
        let state = SessionState::new(Role::Client, me, name, SessionConfig::default());
        tracing::info!(peer = %me, host = %transport.host_peer(), "Joining session");

        Ok(Self::assemble(state, transport, game, net))
    }

    fn assemble(state: SessionState, transport: T, game: G, net: &NetConfig) -> Self {
        let now = Instant::now();
        let maps_dir = net.transfer.maps_dir.clone();
        Self {
            state,
            transport,
            game,
            codec: Codec::with_key(net.security.obfuscation_key),
            rng: Pcg64Mcg::seed_from_u64(rand::random()),
            handlers: dispatch::handler_table(),
            queue: DeferredEventQueue::new(net.queue.capacity),
            events_per_tick: net.queue.events_per_tick.max(1),
            router: TextRouter::new(),
            console: ConsoleLog::new(net.session.console_capacity),
            sender: FileSender::new(net.transfer.effective_chunk_size(), net.transfer.send_interval()),
            receiver: FileReceiver::new(&maps_dir),
            levels: LevelCache::new(&maps_dir),
            maps_dir,
            map_request: None,
            request_timeout: net.transfer.request_timeout(),
            kick_on_version_mismatch: net.security.kick_on_version_mismatch,
            ping_interval: net.session.ping_interval(),
            last_ping: None,
            epoch: now,
            now,
            events: VecDeque::new(),
        }
    }

    /// Reseed slot assignment, for reproducible admissions
    pub fn set_rng_seed(&mut self, seed: u64) {
        self.rng = Pcg64Mcg::seed_from_u64(seed);
    }

    // ========================================================================
    // Polling
    // ========================================================================

    /// Run one tick using the wall clock
    pub fn poll(&mut self) -> Vec<NetEvent> {
        self.poll_at(Instant::now())
    }

    /// Run one tick at `now`
    ///
    /// Drains every pending transport event, dispatches it, then advances
    /// file transfer and pings. Faults are logged and the offending envelope
    /// dropped; nothing here fails the session.
    pub fn poll_at(&mut self, now: Instant) -> Vec<NetEvent> {
        self.now = now;

        while !self.state.is_closed() {
            let Some(event) = self.transport.receive_one() else {
                break;
            };
            self.handle_transport_event(event);
        }

        if !self.state.is_closed() {
            if let Err(e) = self.tick_transfers() {
                tracing::warn!(error = %e, "File transfer failed");
            }
            if let Err(e) = self.tick_pings() {
                tracing::warn!(error = %e, "Ping failed");
            }
        }

        self.events.drain(..).collect()
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { peer, name } => {
                if let Err(e) = self.admit(peer, &name) {
                    tracing::warn!(%peer, error = %e, "Admission failed");
                }
            }
            TransportEvent::Disconnected { peer } => self.on_peer_dropped(peer),
            TransportEvent::Message { from, bytes } => {
                let decoded = self
                    .codec
                    .decode(&bytes)
                    .and_then(|envelope| MessageBody::from_envelope(&envelope));
                let body = match decoded {
                    Ok(body) => body,
                    Err(e) => {
                        tracing::warn!(peer = %from, error = %e, "Dropping malformed envelope");
                        return;
                    }
                };
                let kind = body.kind();
                tracing::trace!(peer = %from, %kind, "Received");
                if let Err(e) = self.dispatch(from, body) {
                    tracing::warn!(peer = %from, %kind, error = %e, "Handler failed");
                }
            }
        }
    }

    fn dispatch(&mut self, from: PeerHandle, body: MessageBody) -> Result<(), SessionError> {
        if let MessageBody::Game { kind, payload } = body {
            self.recv_game(from, kind, payload);
            return Ok(());
        }
        let kind = body.kind();
        match self.handlers.get(&kind).copied() {
            Some(handler) => handler(self, from, body),
            None => {
                tracing::warn!(peer = %from, %kind, "No handler for message kind");
                Ok(())
            }
        }
    }

    fn tick_pings(&mut self) -> Result<(), SessionError> {
        if !self.state.is_host() {
            return Ok(());
        }
        let due = self
            .last_ping
            .is_none_or(|last| self.now.saturating_duration_since(last) >= self.ping_interval);
        if !due {
            return Ok(());
        }
        self.last_ping = Some(self.now);
        let payload = crate::net::messages::PingPayload {
            sent_ms: self.elapsed_ms(),
        };
        self.broadcast(&MessageBody::Ping(payload))
    }

    /// Milliseconds since the session was created, on the poll clock
    fn elapsed_ms(&self) -> u64 {
        self.now.saturating_duration_since(self.epoch).as_millis() as u64
    }

    // ========================================================================
    // Sending
    // ========================================================================

    fn encode(&self, body: &MessageBody) -> Result<Vec<u8>, SessionError> {
        let envelope = body.to_envelope()?;
        Ok(self.codec.encode(&envelope))
    }

    fn broadcast(&mut self, body: &MessageBody) -> Result<(), SessionError> {
        let bytes = self.encode(body)?;
        tracing::trace!(kind = %body.kind(), "Broadcast");
        self.transport.broadcast(&bytes, true)?;
        Ok(())
    }

    fn send_to(&mut self, peer: PeerHandle, body: &MessageBody) -> Result<(), SessionError> {
        let bytes = self.encode(body)?;
        tracing::trace!(%peer, kind = %body.kind(), "Send");
        self.transport.send_to(peer, &bytes, true)?;
        Ok(())
    }

    fn send_to_host(&mut self, body: &MessageBody) -> Result<(), SessionError> {
        let host = self.transport.host_peer();
        self.send_to(host, body)
    }

    fn from_host(&self, from: PeerHandle) -> bool {
        from == self.transport.host_peer()
    }

    fn require_host(&self) -> Result<(), SessionError> {
        if self.state.is_closed() {
            return Err(SessionError::Closed);
        }
        if !self.state.is_host() {
            return Err(SessionError::NotHost);
        }
        Ok(())
    }

    fn require_slot(&self) -> Result<usize, SessionError> {
        if self.state.is_closed() {
            return Err(SessionError::Closed);
        }
        self.state.my_slot.ok_or(SessionError::NoSlot)
    }

    fn close_session(&mut self) {
        if self.state.is_closed() {
            return;
        }
        self.state.phase = SessionPhase::Closed;
        self.state.admission_open = false;
        self.sender.cancel();
        self.receiver.abort();
        self.map_request = None;
        self.transport.close();
        tracing::info!(peer = %self.state.me, "Session closed");
    }

    // ========================================================================
    // Deferred events and console
    // ========================================================================

    /// Fire up to the configured number of parked events into `callbacks`
    ///
    /// Call once per simulation tick.
    pub fn fire_deferred<C: ScriptCallbacks + ?Sized>(&mut self, callbacks: &mut C) -> usize {
        self.queue.fire_pending(callbacks, self.events_per_tick)
    }

    /// Lines waiting for display, oldest first
    pub fn drain_console(&mut self) -> Vec<ConsoleLine> {
        self.console.drain()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn role(&self) -> Role {
        self.state.role
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    pub fn local_peer(&self) -> PeerHandle {
        self.state.me
    }

    pub fn my_slot(&self) -> Option<usize> {
        self.state.my_slot
    }

    pub fn directory(&self) -> &PeerDirectory {
        &self.state.directory
    }

    pub fn config(&self) -> &SessionConfig {
        &self.state.config
    }

    pub fn is_admission_open(&self) -> bool {
        self.state.admission_open
    }

    pub fn game(&self) -> &G {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut G {
        &mut self.game
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn levels(&self) -> &LevelCache {
        &self.levels
    }

    pub fn deferred(&self) -> &DeferredEventQueue {
        &self.queue
    }

    pub fn router_mut(&mut self) -> &mut TextRouter {
        &mut self.router
    }

    /// A map transfer to some peer is in flight
    pub fn is_sending_file(&self) -> bool {
        self.sender.is_active()
    }

    /// Waiting on the host for the current map
    pub fn is_awaiting_map(&self) -> bool {
        self.map_request.is_some()
    }
}
