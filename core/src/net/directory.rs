//! Peer directory
//!
//! Maps player slots to transport peers and tracks per-slot lobby settings.
//! Slots are addressed by index into a fixed table; nothing holds references
//! into it across ticks.

use rand::Rng;
use skirmish_shared::{HUMAN_DIFFICULTY, MAX_SLOTS, NEUTRAL_DIFFICULTY, clamp_name};

use crate::net::messages::SlotInfo;
use crate::net::types::PeerHandle;

/// Who occupies a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupant {
    Empty,
    Human(PeerHandle),
    Ai,
}

/// Membership state of a slot
///
/// `Empty -> Joining -> Active -> Leaving -> Empty`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    /// Assigned, waiting for the peer to acknowledge options
    Joining,
    Active,
    /// Being torn down
    Leaving,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("no empty slot available")]
    SessionFull,
    #[error("{peer} already occupies slot {slot}")]
    AlreadyAssigned { peer: PeerHandle, slot: usize },
    #[error("slot {0} is already occupied")]
    SlotTaken(usize),
    #[error("slot {0} is out of range")]
    InvalidSlot(usize),
}

/// One row of the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotEntry {
    pub occupant: Occupant,
    pub state: SlotState,
    pub name: String,
    pub colour: u8,
    pub team: u8,
    pub difficulty: u8,
    pub ready: bool,
    /// Last measured round trip in milliseconds
    pub last_ping_ms: u32,
}

impl SlotEntry {
    fn vacant(slot: usize) -> Self {
        Self {
            occupant: Occupant::Empty,
            state: SlotState::Empty,
            name: String::new(),
            colour: slot as u8,
            team: slot as u8,
            difficulty: NEUTRAL_DIFFICULTY,
            ready: false,
            last_ping_ms: 0,
        }
    }

    pub fn peer(&self) -> Option<PeerHandle> {
        match self.occupant {
            Occupant::Human(peer) => Some(peer),
            _ => None,
        }
    }

    pub fn is_ai(&self) -> bool {
        self.occupant == Occupant::Ai
    }

    pub fn is_empty(&self) -> bool {
        self.occupant == Occupant::Empty
    }

    pub fn joining(&self) -> bool {
        self.state == SlotState::Joining
    }
}

/// Fixed-size slot table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerDirectory {
    slots: [SlotEntry; MAX_SLOTS],
}

impl Default for PeerDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(SlotEntry::vacant),
        }
    }

    /// Assign `peer` a random empty slot
    ///
    /// Slots below `preferred_limit` are tried first; if all of those are
    /// taken any empty slot is used, leaving the player-cap check to the
    /// caller. The choice is random so a peer cannot predict which slot it
    /// will receive.
    pub fn assign_slot<R: Rng + ?Sized>(
        &mut self,
        peer: PeerHandle,
        preferred_limit: usize,
        rng: &mut R,
    ) -> Result<usize, DirectoryError> {
        if let Some(slot) = self.find(peer) {
            return Err(DirectoryError::AlreadyAssigned { peer, slot });
        }

        let limit = preferred_limit.min(MAX_SLOTS);
        let mut candidates: Vec<usize> = (0..limit).filter(|&s| self.slots[s].is_empty()).collect();
        if candidates.is_empty() {
            candidates = (0..MAX_SLOTS).filter(|&s| self.slots[s].is_empty()).collect();
        }

        while !candidates.is_empty() {
            let slot = candidates.swap_remove(rng.random_range(0..candidates.len()));
            match self.claim(slot, peer) {
                Ok(()) => return Ok(slot),
                Err(DirectoryError::SlotTaken(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(DirectoryError::SessionFull)
    }

    /// Put `peer` into a specific empty slot
    pub fn claim(&mut self, slot: usize, peer: PeerHandle) -> Result<(), DirectoryError> {
        if slot >= MAX_SLOTS {
            return Err(DirectoryError::InvalidSlot(slot));
        }
        if let Some(existing) = self.find(peer) {
            return Err(DirectoryError::AlreadyAssigned {
                peer,
                slot: existing,
            });
        }
        let entry = &mut self.slots[slot];
        if !entry.is_empty() {
            return Err(DirectoryError::SlotTaken(slot));
        }

        entry.occupant = Occupant::Human(peer);
        entry.state = SlotState::Joining;
        entry.difficulty = HUMAN_DIFFICULTY;
        entry.ready = false;
        entry.last_ping_ms = 0;
        Ok(())
    }

    /// Place an AI player into an empty slot
    pub fn set_ai(&mut self, slot: usize, difficulty: u8) -> Result<(), DirectoryError> {
        let entry = self.slots.get_mut(slot).ok_or(DirectoryError::InvalidSlot(slot))?;
        if entry.peer().is_some() {
            return Err(DirectoryError::SlotTaken(slot));
        }
        entry.occupant = Occupant::Ai;
        entry.state = SlotState::Active;
        entry.difficulty = difficulty;
        entry.ready = true;
        Ok(())
    }

    /// Mark a slot as being torn down. Returns false if it was already empty.
    pub fn begin_leave(&mut self, slot: usize) -> bool {
        match self.slots.get_mut(slot) {
            Some(entry) if !entry.is_empty() => {
                entry.state = SlotState::Leaving;
                true
            }
            _ => false,
        }
    }

    /// Empty a slot. Colour and team stay with the slot; difficulty resets
    /// to neutral. Returns false if the slot was already empty.
    pub fn release(&mut self, slot: usize) -> bool {
        let Some(entry) = self.slots.get_mut(slot) else {
            return false;
        };
        if entry.is_empty() {
            return false;
        }
        entry.occupant = Occupant::Empty;
        entry.state = SlotState::Empty;
        entry.name.clear();
        entry.difficulty = NEUTRAL_DIFFICULTY;
        entry.ready = false;
        entry.last_ping_ms = 0;
        true
    }

    pub fn find(&self, peer: PeerHandle) -> Option<usize> {
        self.slots.iter().position(|e| e.peer() == Some(peer))
    }

    pub fn is_human(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(|e| e.peer().is_some())
    }

    pub fn is_ai(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(SlotEntry::is_ai)
    }

    pub fn peer(&self, slot: usize) -> Option<PeerHandle> {
        self.slots.get(slot).and_then(SlotEntry::peer)
    }

    pub fn entry(&self, slot: usize) -> Option<&SlotEntry> {
        self.slots.get(slot)
    }

    pub fn entry_mut(&mut self, slot: usize) -> Option<&mut SlotEntry> {
        self.slots.get_mut(slot)
    }

    pub fn entries(&self) -> impl Iterator<Item = (usize, &SlotEntry)> {
        self.slots.iter().enumerate()
    }

    /// Slots with a human occupant
    pub fn human_slots(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_SLOTS).filter(|&s| self.is_human(s))
    }

    /// Humans and AIs
    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|e| !e.is_empty()).count()
    }

    pub fn human_count(&self) -> usize {
        self.human_slots().count()
    }

    /// Clear the joining flag once the peer acknowledged options
    pub fn mark_active(&mut self, slot: usize) -> bool {
        match self.slots.get_mut(slot) {
            Some(entry) if entry.state == SlotState::Joining => {
                entry.state = SlotState::Active;
                true
            }
            _ => false,
        }
    }

    pub fn set_name(&mut self, slot: usize, name: &str) {
        if let Some(entry) = self.slots.get_mut(slot) {
            entry.name = clamp_name(name);
        }
    }

    /// A colour is free for `slot` if no other human uses it
    pub fn safe_to_use_colour(&self, slot: usize, colour: u8) -> bool {
        self.slots
            .iter()
            .enumerate()
            .all(|(i, e)| i == slot || e.peer().is_none() || e.colour != colour)
    }

    pub fn all_humans_ready(&self) -> bool {
        self.slots
            .iter()
            .filter(|e| e.peer().is_some())
            .all(|e| e.ready)
    }

    /// Slot table as carried in an options snapshot
    pub fn snapshot(&self) -> Vec<SlotInfo> {
        self.slots
            .iter()
            .map(|e| SlotInfo {
                peer: e.peer(),
                ai: e.is_ai(),
                joining: e.joining(),
                ready: e.ready,
                colour: e.colour,
                team: e.team,
                difficulty: e.difficulty,
                name: e.name.clone(),
            })
            .collect()
    }

    /// Replace the whole table with the host's copy
    pub fn apply_snapshot(&mut self, slots: &[SlotInfo]) {
        for (index, entry) in self.slots.iter_mut().enumerate() {
            let Some(info) = slots.get(index) else {
                *entry = SlotEntry::vacant(index);
                continue;
            };
            let occupant = match (info.peer, info.ai) {
                (Some(peer), _) => Occupant::Human(peer),
                (None, true) => Occupant::Ai,
                (None, false) => Occupant::Empty,
            };
            let state = match occupant {
                Occupant::Empty => SlotState::Empty,
                _ if info.joining => SlotState::Joining,
                _ => SlotState::Active,
            };
            *entry = SlotEntry {
                occupant,
                state,
                name: clamp_name(&info.name),
                colour: info.colour,
                team: info.team,
                difficulty: info.difficulty,
                ready: info.ready,
                last_ping_ms: entry.last_ping_ms,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    fn rng(seed: u64) -> Pcg64Mcg {
        Pcg64Mcg::seed_from_u64(seed)
    }

    fn assert_unique_peers(dir: &PeerDirectory) {
        let mut seen = std::collections::HashSet::new();
        for (_, entry) in dir.entries() {
            if let Some(peer) = entry.peer() {
                assert!(seen.insert(peer), "{peer} occupies two slots");
            }
        }
    }

    #[test]
    fn test_assign_sets_joining() {
        let mut dir = PeerDirectory::new();
        let slot = dir.assign_slot(PeerHandle(5), MAX_SLOTS, &mut rng(1)).unwrap();

        assert_eq!(dir.find(PeerHandle(5)), Some(slot));
        assert!(dir.is_human(slot));
        assert!(dir.entry(slot).unwrap().joining());
        assert_eq!(dir.entry(slot).unwrap().difficulty, HUMAN_DIFFICULTY);
    }

    #[test]
    fn test_assign_twice_rejected() {
        let mut dir = PeerDirectory::new();
        let slot = dir.assign_slot(PeerHandle(5), MAX_SLOTS, &mut rng(1)).unwrap();
        let result = dir.assign_slot(PeerHandle(5), MAX_SLOTS, &mut rng(2));
        assert_eq!(
            result,
            Err(DirectoryError::AlreadyAssigned {
                peer: PeerHandle(5),
                slot
            })
        );
    }

    #[test]
    fn test_assign_until_full() {
        let mut dir = PeerDirectory::new();
        let mut rng = rng(7);
        for i in 0..MAX_SLOTS as u32 {
            dir.assign_slot(PeerHandle(i + 1), MAX_SLOTS, &mut rng).unwrap();
        }
        assert_eq!(dir.human_count(), MAX_SLOTS);
        assert_eq!(
            dir.assign_slot(PeerHandle(100), MAX_SLOTS, &mut rng),
            Err(DirectoryError::SessionFull)
        );
        assert_unique_peers(&dir);
    }

    #[test]
    fn test_assign_prefers_slots_under_limit() {
        let mut dir = PeerDirectory::new();
        let mut rng = rng(3);
        for i in 0..4u32 {
            let slot = dir.assign_slot(PeerHandle(i + 1), 4, &mut rng).unwrap();
            assert!(slot < 4);
        }
        // Cap reached: falls back to a slot beyond it
        let slot = dir.assign_slot(PeerHandle(9), 4, &mut rng).unwrap();
        assert!(slot >= 4);
    }

    #[test]
    fn test_assign_is_randomized() {
        let mut first_slots = std::collections::HashSet::new();
        for seed in 0..32 {
            let mut dir = PeerDirectory::new();
            first_slots.insert(dir.assign_slot(PeerHandle(1), MAX_SLOTS, &mut rng(seed)).unwrap());
        }
        assert!(first_slots.len() > 1, "slot choice should vary with the generator");
    }

    #[test]
    fn test_assign_skips_occupied() {
        let mut dir = PeerDirectory::new();
        for slot in 0..MAX_SLOTS {
            if slot != 6 {
                dir.set_ai(slot, 10).unwrap();
            }
        }
        for seed in 0..8 {
            let mut copy = dir.clone();
            assert_eq!(copy.assign_slot(PeerHandle(1), MAX_SLOTS, &mut rng(seed)), Ok(6));
        }
    }

    #[test]
    fn test_slot_uniqueness_under_churn() {
        let mut dir = PeerDirectory::new();
        let mut rng = rng(42);
        for round in 0..200u32 {
            let peer = PeerHandle(round % 13);
            match dir.find(peer) {
                Some(slot) if round % 3 == 0 => {
                    assert!(dir.release(slot));
                }
                Some(_) => {}
                None => {
                    let _ = dir.assign_slot(peer, MAX_SLOTS, &mut rng);
                }
            }
            assert_unique_peers(&dir);
        }
    }

    #[test]
    fn test_claim_rejects_duplicates() {
        let mut dir = PeerDirectory::new();
        dir.claim(2, PeerHandle(1)).unwrap();
        assert_eq!(dir.claim(2, PeerHandle(3)), Err(DirectoryError::SlotTaken(2)));
        assert!(matches!(
            dir.claim(3, PeerHandle(1)),
            Err(DirectoryError::AlreadyAssigned { .. })
        ));
        assert_eq!(dir.claim(MAX_SLOTS, PeerHandle(4)), Err(DirectoryError::InvalidSlot(MAX_SLOTS)));
    }

    #[test]
    fn test_release_resets_difficulty_keeps_colour() {
        let mut dir = PeerDirectory::new();
        dir.claim(1, PeerHandle(1)).unwrap();
        dir.entry_mut(1).unwrap().colour = 7;
        assert!(dir.release(1));
        let entry = dir.entry(1).unwrap();
        assert!(entry.is_empty());
        assert_eq!(entry.difficulty, NEUTRAL_DIFFICULTY);
        assert_eq!(entry.colour, 7);

        // Second release is a no-op
        assert!(!dir.release(1));
    }

    #[test]
    fn test_mark_active_clears_joining() {
        let mut dir = PeerDirectory::new();
        dir.claim(0, PeerHandle(1)).unwrap();
        assert!(dir.mark_active(0));
        assert!(!dir.entry(0).unwrap().joining());
        assert!(!dir.mark_active(0));
    }

    #[test]
    fn test_colour_safety() {
        let mut dir = PeerDirectory::new();
        dir.claim(0, PeerHandle(1)).unwrap();
        dir.claim(1, PeerHandle(2)).unwrap();
        dir.set_ai(2, 10).unwrap();
        dir.entry_mut(0).unwrap().colour = 4;
        dir.entry_mut(2).unwrap().colour = 5;

        assert!(!dir.safe_to_use_colour(1, 4));
        assert!(dir.safe_to_use_colour(0, 4));
        // AI colours do not block humans
        assert!(dir.safe_to_use_colour(1, 5));
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut dir = PeerDirectory::new();
        dir.claim(3, PeerHandle(9)).unwrap();
        dir.set_name(3, "Guest");
        dir.set_ai(5, 12).unwrap();

        let mut mirror = PeerDirectory::new();
        mirror.claim(0, PeerHandle(1)).unwrap();
        mirror.apply_snapshot(&dir.snapshot());

        assert_eq!(mirror, dir);
        assert_eq!(mirror.find(PeerHandle(1)), None);
    }

    #[test]
    fn test_all_humans_ready() {
        let mut dir = PeerDirectory::new();
        assert!(dir.all_humans_ready());
        dir.claim(0, PeerHandle(1)).unwrap();
        dir.set_ai(1, 10).unwrap();
        assert!(!dir.all_humans_ready());
        dir.entry_mut(0).unwrap().ready = true;
        assert!(dir.all_humans_ready());
    }
}
