//! Membership and lobby control payloads

use bitcode::{Decode, Encode};
use skirmish_shared::BuildInfo;

use crate::net::types::{KickReason, RejectReason};

/// A peer is leaving its slot
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct LeavingNotice {
    pub slot: u8,
    /// The leaver is the host, so the session ends for everyone
    pub host: bool,
}

/// Slot value of a kick aimed at a peer the host never seated
pub const UNSEATED_SLOT: u8 = u8::MAX;

/// Host removes a slot; every peer tears it down
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct KickNotice {
    pub slot: u8,
    pub reason: KickReason,
}

/// Host refuses a connection outright
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct JoinRejected {
    pub reason: RejectReason,
}

/// Joining peer confirms it applied the options snapshot
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct PlayerResponding {
    pub slot: u8,
}

/// Build fingerprint, checked by the host
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct VersionCheck {
    pub slot: u8,
    pub build: BuildInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ColourRequest {
    pub slot: u8,
    pub colour: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct TeamRequest {
    pub slot: u8,
    pub team: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ReadyRequest {
    pub slot: u8,
    pub ready: bool,
}

/// Ask the host for a map this peer lacks
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct MapRequest {
    pub map: String,
}

/// Round-trip probe; the pong echoes the timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct PingPayload {
    pub sent_ms: u64,
}
