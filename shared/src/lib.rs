//! Shared types for the Skirmish multiplayer layer.
//!
//! Slot limits and build metadata live here so that the session core and any
//! front-end agree on them without depending on each other.

pub mod netplay;
pub mod slots;

pub use netplay::{BuildInfo, BuildMismatch, PROTOCOL_VERSION};
pub use slots::*;
