//! Session configuration snapshot
//!
//! The host owns the canonical [`SessionConfig`]. Every change resends the
//! whole [`OptionsSnapshot`]; clients overwrite their cached copy wholesale.

use bitcode::{Decode, Encode};
use skirmish_shared::{MAX_NAME_LEN, MAX_SLOTS, MAX_STRUCTURE_LIMITS, MIN_PLAYERS};

use crate::net::types::{PeerHandle, SessionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum GameType {
    #[default]
    Skirmish,
    Campaign,
    TeamPlay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum AlliancesMode {
    #[default]
    NoAlliances,
    /// Players may form and break alliances in game
    Alliances,
    /// Alliances fixed by team selection
    FixedTeams,
}

/// Starting power
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum PowerLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl PowerLevel {
    pub const fn amount(self) -> u32 {
        match self {
            Self::Low => 400,
            Self::Medium => 700,
            Self::High => 1000,
        }
    }
}

/// Starting base layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum BaseType {
    None,
    #[default]
    Bases,
    AdvancedBases,
}

/// Cap on how many of one structure a player may build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct StructureLimit {
    pub structure_id: u32,
    pub limit: u32,
}

/// Rules of the session, owned by the host
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct SessionConfig {
    pub session_name: String,
    pub map_name: String,
    /// Player cap of the declared game type
    pub max_players: u8,
    pub game_type: GameType,
    pub fog_enabled: bool,
    pub alliances: AlliancesMode,
    pub power_level: PowerLevel,
    pub base_type: BaseType,
    pub structure_limits: Vec<StructureLimit>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_name: "Skirmish".to_string(),
            map_name: "Rush".to_string(),
            max_players: 4,
            game_type: GameType::default(),
            fog_enabled: true,
            alliances: AlliancesMode::default(),
            power_level: PowerLevel::default(),
            base_type: BaseType::default(),
            structure_limits: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// File name the map is stored under, e.g. `4c-Rush.wz`
    pub fn map_file_name(&self) -> String {
        format!("{}c-{}.wz", self.max_players, self.map_name)
    }

    pub fn structure_limit(&self, structure_id: u32) -> Option<u32> {
        self.structure_limits
            .iter()
            .find(|l| l.structure_id == structure_id)
            .map(|l| l.limit)
    }

    /// Insert or replace a structure limit override
    pub fn set_structure_limit(&mut self, structure_id: u32, limit: u32) -> Result<(), SessionError> {
        if let Some(existing) = self
            .structure_limits
            .iter_mut()
            .find(|l| l.structure_id == structure_id)
        {
            existing.limit = limit;
            return Ok(());
        }
        if self.structure_limits.len() >= MAX_STRUCTURE_LIMITS {
            return Err(SessionError::StructureLimitsFull);
        }
        self.structure_limits.push(StructureLimit {
            structure_id,
            limit,
        });
        Ok(())
    }

    /// Clamp names to the wire limit and the player cap to the slot table
    pub fn sanitize(&mut self) {
        self.max_players = self.max_players.clamp(MIN_PLAYERS, MAX_SLOTS as u8);
        truncate_utf8(&mut self.session_name, MAX_NAME_LEN);
        truncate_utf8(&mut self.map_name, MAX_NAME_LEN);
        self.structure_limits.truncate(MAX_STRUCTURE_LIMITS);
    }
}

fn truncate_utf8(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

/// One row of the slot table carried in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Default, Encode, Decode)]
pub struct SlotInfo {
    pub peer: Option<PeerHandle>,
    pub ai: bool,
    pub joining: bool,
    pub ready: bool,
    pub colour: u8,
    pub team: u8,
    pub difficulty: u8,
    pub name: String,
}

/// Peer the snapshot was triggered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct NewPlayer {
    pub peer: PeerHandle,
    pub slot: u8,
}

/// Everything a peer needs to mirror the host's lobby
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct OptionsSnapshot {
    /// Version tag of the sending build
    pub version: String,
    pub config: SessionConfig,
    pub slots: Vec<SlotInfo>,
    pub new_player: Option<NewPlayer>,
}
