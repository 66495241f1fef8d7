//! Chat, AI and beacon payloads

use bitcode::{Decode, Encode};

/// Player chat line
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct TextMessage {
    pub from: u8,
    /// Sent to explicitly addressed slots only
    pub private: bool,
    pub text: String,
}

/// Chat addressed to an AI slot, forwarded to the peer that simulates it
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct AiTextMessage {
    pub from: u8,
    pub to: u8,
    pub text: String,
}

/// Map marker placed by one player for another
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct BeaconMessage {
    pub from: u8,
    pub to: u8,
    pub x: i32,
    pub y: i32,
    pub text: String,
}
