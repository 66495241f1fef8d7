//! Chat, AI messages, beacons and pass-through traffic

use skirmish_shared::MAX_SLOTS;

use super::NetSession;
use crate::net::codec::MessageType;
use crate::net::console::ConsoleLine;
use crate::net::game::GameStateMutator;
use crate::net::messages::{AiTextMessage, BeaconMessage, MessageBody, TextMessage};
use crate::net::msg_queue::DeferredEvent;
use crate::net::responsibility::my_responsibility;
use crate::net::text::{Route, TextRouter, parse_address};
use crate::net::transport::Transport;
use crate::net::types::{NetEvent, PeerHandle, SessionError};

impl<T: Transport, G: GameStateMutator> NetSession<T, G> {
    // ========================================================================
    // Outgoing
    // ========================================================================

    /// Send a chat line
    ///
    /// With `broadcast_all` the line goes to every peer as written and to
    /// every AI slot, open channel or not. Otherwise the address prefix picks
    /// the destinations. Does nothing until options have arrived.
    pub fn send_text(&mut self, text: &str, broadcast_all: bool) -> Result<(), SessionError> {
        if self.state.is_closed() {
            return Err(SessionError::Closed);
        }
        let Some(my_slot) = self.chat_slot() else {
            return Ok(());
        };

        if broadcast_all {
            self.broadcast(&MessageBody::Text(TextMessage {
                from: my_slot as u8,
                private: false,
                text: text.to_string(),
            }))?;
            for slot in (0..MAX_SLOTS).filter(|&slot| slot != my_slot) {
                if !self.state.directory.is_ai(slot) {
                    continue;
                }
                if let Some(route) = TextRouter::ai_route(&self.state.directory, self.state.me, slot) {
                    self.deliver_ai(my_slot, route, text)?;
                }
            }
            self.echo(my_slot, text, false);
            return Ok(());
        }

        let address = parse_address(text);
        let routes = self
            .router
            .route(&address, &self.state.directory, self.state.me, my_slot);
        let body = address.body.to_string();
        let private = !address.is_broadcast();
        tracing::debug!(routes = routes.len(), private, "Routing chat");

        for route in routes {
            match route {
                Route::Human { peer, private, .. } => {
                    self.send_to(
                        peer,
                        &MessageBody::Text(TextMessage {
                            from: my_slot as u8,
                            private,
                            text: body.clone(),
                        }),
                    )?;
                }
                Route::LocalAi { .. } | Route::RemoteAi { .. } => self.deliver_ai(my_slot, route, &body)?,
            }
        }

        self.echo(my_slot, &body, private);
        Ok(())
    }

    /// Direct a message at an AI slot, locally if this peer simulates it
    pub fn send_ai_message(&mut self, to: usize, text: &str) -> Result<(), SessionError> {
        if self.state.is_closed() {
            return Err(SessionError::Closed);
        }
        let Some(my_slot) = self.chat_slot() else {
            return Ok(());
        };
        match TextRouter::ai_route(&self.state.directory, self.state.me, to) {
            Some(route) => self.deliver_ai(my_slot, route, text),
            None => Ok(()),
        }
    }

    /// Park a message for a local AI or forward it to the peer simulating it
    fn deliver_ai(&mut self, from: usize, route: Route, text: &str) -> Result<(), SessionError> {
        match route {
            Route::LocalAi { slot } => self.park(DeferredEvent::ai_message(from, slot, text)),
            Route::RemoteAi { slot, via } => self.send_to(
                via,
                &MessageBody::AiText(AiTextMessage {
                    from: from as u8,
                    to: slot as u8,
                    text: text.to_string(),
                }),
            )?,
            Route::Human { .. } => {}
        }
        Ok(())
    }

    /// Place a beacon for the player in `to`
    pub fn send_beacon(&mut self, to: usize, x: i32, y: i32, text: &str) -> Result<(), SessionError> {
        if self.state.is_closed() {
            return Err(SessionError::Closed);
        }
        let Some(my_slot) = self.chat_slot() else {
            return Ok(());
        };

        let target = if to == my_slot {
            None
        } else if let Some(peer) = self.state.directory.peer(to) {
            Some(peer)
        } else {
            match TextRouter::ai_route(&self.state.directory, self.state.me, to) {
                Some(Route::RemoteAi { via, .. }) => Some(via),
                Some(_) => None,
                None => return Ok(()),
            }
        };

        match target {
            Some(peer) => self.send_to(
                peer,
                &MessageBody::Beacon(BeaconMessage {
                    from: my_slot as u8,
                    to: to as u8,
                    x,
                    y,
                    text: text.to_string(),
                }),
            ),
            None => {
                self.park(DeferredEvent::beacon(my_slot, to, x, y, text));
                Ok(())
            }
        }
    }

    /// Queue the cutscene-finished notification for the next tick
    pub fn notify_video_quit(&mut self) {
        self.park(DeferredEvent::video_quit());
    }

    /// Send simulation traffic to every peer
    pub fn send_game_message(&mut self, kind: MessageType, payload: Vec<u8>) -> Result<(), SessionError> {
        if !kind.is_game_traffic() {
            return Err(SessionError::NotGameTraffic(kind));
        }
        if self.state.is_closed() {
            return Err(SessionError::Closed);
        }
        self.broadcast(&MessageBody::Game { kind, payload })
    }

    pub fn send_audio(&mut self, data: Vec<u8>) -> Result<(), SessionError> {
        if self.state.is_closed() {
            return Err(SessionError::Closed);
        }
        self.broadcast(&MessageBody::AudioStream(data))
    }

    /// Local slot, once options have arrived
    fn chat_slot(&self) -> Option<usize> {
        if !self.state.options_received {
            return None;
        }
        self.state.my_slot
    }

    fn park(&mut self, event: DeferredEvent) {
        if let Err(e) = self.queue.push(event) {
            tracing::warn!(error = %e, "Deferred event dropped");
        }
    }

    fn echo(&mut self, slot: usize, text: &str, private: bool) {
        let name = self.state.slot_name(slot);
        let text = if private {
            format!("(private) {text}")
        } else {
            text.to_string()
        };
        self.console.push(ConsoleLine::chat(&name, text));
    }

    // ========================================================================
    // Incoming
    // ========================================================================

    /// Sender's slot, provided the peer owns the slot it claims
    fn sender_slot(&self, from: PeerHandle, claimed: u8) -> Option<usize> {
        let slot = claimed as usize;
        if self.state.verify_sender(from, slot) {
            return Some(slot);
        }
        tracing::warn!(peer = %from, slot, "Message claims a slot the sender does not own");
        None
    }

    pub(super) fn recv_text(&mut self, from: PeerHandle, message: TextMessage) -> Result<(), SessionError> {
        let Some(from_slot) = self.sender_slot(from, message.from) else {
            return Ok(());
        };
        self.echo(from_slot, &message.text, message.private);
        self.events.push_back(NetEvent::TextReceived {
            from_slot,
            text: message.text,
            private: message.private,
        });
        Ok(())
    }

    pub(super) fn recv_ai_text(&mut self, from: PeerHandle, message: AiTextMessage) -> Result<(), SessionError> {
        let Some(from_slot) = self.sender_slot(from, message.from) else {
            return Ok(());
        };
        let to = message.to as usize;
        if !self.state.directory.is_ai(to) || !my_responsibility(&self.state.directory, to, self.state.me) {
            tracing::debug!(to, "AI message for a slot this peer does not simulate");
            return Ok(());
        }
        self.park(DeferredEvent::ai_message(from_slot, to, message.text));
        Ok(())
    }

    pub(super) fn recv_beacon(&mut self, from: PeerHandle, message: BeaconMessage) -> Result<(), SessionError> {
        let Some(from_slot) = self.sender_slot(from, message.from) else {
            return Ok(());
        };
        let to = message.to as usize;
        let mine = Some(to) == self.state.my_slot
            || (self.state.directory.is_ai(to) && my_responsibility(&self.state.directory, to, self.state.me));
        if !mine {
            tracing::debug!(to, "Beacon for a slot this peer does not own");
            return Ok(());
        }
        self.park(DeferredEvent::beacon(from_slot, to, message.x, message.y, message.text));
        Ok(())
    }

    pub(super) fn recv_audio(&mut self, from: PeerHandle, data: Vec<u8>) -> Result<(), SessionError> {
        if let Some(from_slot) = self.state.directory.find(from) {
            self.events.push_back(NetEvent::AudioStream { from_slot, data });
        }
        Ok(())
    }

    /// Simulation traffic reaches the game only while it runs and this peer
    /// has finished joining
    pub(super) fn recv_game(&mut self, from: PeerHandle, kind: MessageType, payload: Vec<u8>) {
        if !self.state.in_game() || self.state.is_joining() {
            tracing::trace!(peer = %from, %kind, "Dropping game traffic outside the game");
            return;
        }
        let Some(from_slot) = self.state.directory.find(from) else {
            tracing::debug!(peer = %from, %kind, "Game traffic from a peer without a slot");
            return;
        };
        self.events.push_back(NetEvent::GameMessage {
            from_slot,
            kind,
            payload,
        });
    }
}
