//! Boundary to the game simulation
//!
//! The session layer never touches units or structures directly. It tells
//! the game what changed through [`GameStateMutator`].

use crate::net::messages::SessionConfig;

pub trait GameStateMutator {
    /// Remove everything the player in `slot` owns
    fn clear_player_entities(&mut self, slot: usize);

    /// Adopt a new configuration snapshot
    fn apply_session_config(&mut self, config: &SessionConfig);

    /// Create the local stand-in for a remote player
    fn spawn_remote_proxy(&mut self, slot: usize);
}

/// A call made on a [`RecordingGame`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameCall {
    ClearPlayer(usize),
    ApplyConfig(SessionConfig),
    SpawnProxy(usize),
}

/// Mutator that only records what it was asked to do
#[derive(Debug, Clone, Default)]
pub struct RecordingGame {
    pub calls: Vec<GameCall>,
}

impl RecordingGame {
    pub fn cleared(&self) -> Vec<usize> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                GameCall::ClearPlayer(slot) => Some(*slot),
                _ => None,
            })
            .collect()
    }

    pub fn spawned(&self) -> Vec<usize> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                GameCall::SpawnProxy(slot) => Some(*slot),
                _ => None,
            })
            .collect()
    }

    pub fn last_config(&self) -> Option<&SessionConfig> {
        self.calls.iter().rev().find_map(|c| match c {
            GameCall::ApplyConfig(config) => Some(config),
            _ => None,
        })
    }
}

impl GameStateMutator for RecordingGame {
    fn clear_player_entities(&mut self, slot: usize) {
        self.calls.push(GameCall::ClearPlayer(slot));
    }

    fn apply_session_config(&mut self, config: &SessionConfig) {
        self.calls.push(GameCall::ApplyConfig(config.clone()));
    }

    fn spawn_remote_proxy(&mut self, slot: usize) {
        self.calls.push(GameCall::SpawnProxy(slot));
    }
}
