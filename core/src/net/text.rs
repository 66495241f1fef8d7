//! Chat addressing and directed-message routing
//!
//! Chat text may start with an address prefix:
//!
//! ```text
//! [.][0-8]*body
//! ```
//!
//! A leading `.` also delivers to human teammates. Each following digit names
//! a destination slot. Without either, the line goes to every open channel.
//! AI destinations never cross the network when the sender itself simulates
//! them; otherwise they are forwarded to whichever peer does.

use skirmish_shared::MAX_SLOTS;

use crate::net::directory::PeerDirectory;
use crate::net::responsibility::{my_responsibility, responsible_for};
use crate::net::types::PeerHandle;

/// Parsed address prefix of a chat line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextAddress<'a> {
    /// Deliver to human teammates as well
    pub allies: bool,
    /// Explicit destination slots, ascending and unique
    pub slots: Vec<usize>,
    pub body: &'a str,
}

impl TextAddress<'_> {
    /// Neither `.` nor digits: an open-channel broadcast
    pub fn is_broadcast(&self) -> bool {
        !self.allies && self.slots.is_empty()
    }
}

/// Split a chat line into its address prefix and body
///
/// Digits naming slots past the table are consumed but ignored. One space
/// after a prefix is dropped.
pub fn parse_address(text: &str) -> TextAddress<'_> {
    let (allies, rest) = match text.strip_prefix('.') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let digits = rest
        .bytes()
        .take_while(|b| (b'0'..=b'8').contains(b))
        .count();

    let mut slots: Vec<usize> = rest.as_bytes()[..digits]
        .iter()
        .map(|b| (b - b'0') as usize)
        .filter(|&slot| slot < MAX_SLOTS)
        .collect();
    slots.sort_unstable();
    slots.dedup();

    let mut body = &rest[digits..];
    if allies || digits > 0 {
        body = body.strip_prefix(' ').unwrap_or(body);
    }

    TextAddress {
        allies,
        slots,
        body,
    }
}

/// Where one copy of a chat line goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Human peer, sent as a text envelope
    Human {
        slot: usize,
        peer: PeerHandle,
        private: bool,
    },
    /// AI simulated by this peer, delivered without touching the network
    LocalAi { slot: usize },
    /// AI simulated elsewhere, forwarded to the responsible peer
    RemoteAi { slot: usize, via: PeerHandle },
}

impl Route {
    pub fn slot(&self) -> usize {
        match *self {
            Self::Human { slot, .. } | Self::LocalAi { slot } | Self::RemoteAi { slot, .. } => slot,
        }
    }
}

/// Fans chat out according to the address prefix and open channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRouter {
    open_channels: [bool; MAX_SLOTS],
}

impl Default for TextRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl TextRouter {
    /// All channels start open
    pub fn new() -> Self {
        Self {
            open_channels: [true; MAX_SLOTS],
        }
    }

    pub fn set_channel_open(&mut self, slot: usize, open: bool) {
        if let Some(channel) = self.open_channels.get_mut(slot) {
            *channel = open;
        }
    }

    pub fn is_channel_open(&self, slot: usize) -> bool {
        self.open_channels.get(slot).copied().unwrap_or(false)
    }

    /// Compute deliveries for a line sent by `me` from `my_slot`
    pub fn route(
        &self,
        address: &TextAddress<'_>,
        directory: &PeerDirectory,
        me: PeerHandle,
        my_slot: usize,
    ) -> Vec<Route> {
        let mut routes = Vec::new();

        if address.is_broadcast() {
            for slot in 0..MAX_SLOTS {
                if slot != my_slot && self.is_channel_open(slot) {
                    Self::push_route(&mut routes, directory, me, slot, false);
                }
            }
            return routes;
        }

        for &slot in &address.slots {
            if slot != my_slot {
                Self::push_route(&mut routes, directory, me, slot, true);
            }
        }

        if address.allies {
            let my_team = directory.entry(my_slot).map(|e| e.team);
            for slot in directory.human_slots() {
                let teammate = directory.entry(slot).map(|e| e.team) == my_team;
                if slot != my_slot && teammate && !routes.iter().any(|r| r.slot() == slot) {
                    Self::push_route(&mut routes, directory, me, slot, true);
                }
            }
        }

        routes
    }

    fn push_route(
        routes: &mut Vec<Route>,
        directory: &PeerDirectory,
        me: PeerHandle,
        slot: usize,
        private: bool,
    ) {
        if let Some(peer) = directory.peer(slot) {
            routes.push(Route::Human {
                slot,
                peer,
                private,
            });
        } else if directory.is_ai(slot) {
            if let Some(route) = Self::ai_route(directory, me, slot) {
                routes.push(route);
            }
        }
    }

    /// Route for a message to an AI slot, or `None` if nobody simulates it
    pub fn ai_route(directory: &PeerDirectory, me: PeerHandle, slot: usize) -> Option<Route> {
        if my_responsibility(directory, slot, me) {
            return Some(Route::LocalAi { slot });
        }
        match responsible_for(directory, slot) {
            Some(via) => Some(Route::RemoteAi { slot, via }),
            None => {
                tracing::warn!(slot, "No peer is responsible for AI slot, dropping message");
                None
            }
        }
    }
}
