//! Responsibility resolver
//!
//! Decides which connected peer drives the simulation of a slot. A human
//! drives their own slot. Slots without a human (AI or empty) are driven by
//! the nearest human below them, or failing that the nearest human above.
//! Lower-numbered peers therefore absorb orphaned slots first.
//!
//! These are pure functions over the directory and must be called fresh
//! each time; membership can change between two calls in the same tick.

use skirmish_shared::MAX_SLOTS;

use crate::net::directory::PeerDirectory;
use crate::net::types::PeerHandle;

/// Slot whose human occupant is responsible for `slot`
///
/// Returns `None` when the directory holds no humans at all.
pub fn responsible_slot(directory: &PeerDirectory, slot: usize) -> Option<usize> {
    if slot >= MAX_SLOTS {
        return None;
    }
    if directory.is_human(slot) {
        return Some(slot);
    }

    (0..slot)
        .rev()
        .find(|&s| directory.is_human(s))
        .or_else(|| (slot + 1..MAX_SLOTS).find(|&s| directory.is_human(s)))
}

/// Peer responsible for `slot`, or `None` for nobody
///
/// Nobody means the slot should be simulated locally without network
/// authority.
pub fn responsible_for(directory: &PeerDirectory, slot: usize) -> Option<PeerHandle> {
    responsible_slot(directory, slot).and_then(|s| directory.peer(s))
}

/// True if the local peer must drive `slot`
pub fn my_responsibility(directory: &PeerDirectory, slot: usize, me: PeerHandle) -> bool {
    responsible_for(directory, slot) == Some(me)
}

/// True if the peer in `player` drives `in_question`
pub fn is_responsible(directory: &PeerDirectory, player: usize, in_question: usize) -> bool {
    responsible_slot(directory, in_question) == Some(player)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory_with(humans: &[usize], ais: &[usize]) -> PeerDirectory {
        let mut dir = PeerDirectory::new();
        for &slot in humans {
            dir.claim(slot, PeerHandle(slot as u32 + 100)).unwrap();
        }
        for &slot in ais {
            dir.set_ai(slot, 10).unwrap();
        }
        dir
    }

    #[test]
    fn test_human_is_own_responsibility() {
        let dir = directory_with(&[2, 5], &[]);
        assert_eq!(responsible_for(&dir, 2), Some(PeerHandle(102)));
        assert_eq!(responsible_for(&dir, 5), Some(PeerHandle(105)));
    }

    #[test]
    fn test_scans_down_first() {
        let dir = directory_with(&[1, 3, 6], &[4, 7]);
        // Nearest human below 4 is 3
        assert_eq!(responsible_slot(&dir, 4), Some(3));
        // Nearest human below 7 is 6
        assert_eq!(responsible_slot(&dir, 7), Some(6));
        // Nearest below 2 is 1
        assert_eq!(responsible_slot(&dir, 2), Some(1));
    }

    #[test]
    fn test_scans_up_when_nothing_below() {
        let dir = directory_with(&[3, 6], &[0, 1]);
        assert_eq!(responsible_slot(&dir, 0), Some(3));
        assert_eq!(responsible_slot(&dir, 1), Some(3));
    }

    #[test]
    fn test_nobody_without_humans() {
        let dir = directory_with(&[], &[0, 1, 2]);
        for slot in 0..MAX_SLOTS {
            assert_eq!(responsible_for(&dir, slot), None);
        }
    }

    #[test]
    fn test_totality_with_any_human() {
        for human in 0..MAX_SLOTS {
            let dir = directory_with(&[human], &[]);
            for slot in 0..MAX_SLOTS {
                assert_eq!(
                    responsible_for(&dir, slot),
                    Some(PeerHandle(human as u32 + 100)),
                    "slot {slot} with lone human {human}"
                );
            }
        }
    }

    #[test]
    fn test_every_pattern_is_total() {
        for mask in 1u32..(1 << MAX_SLOTS) {
            let humans: Vec<usize> = (0..MAX_SLOTS).filter(|s| mask & (1 << s) != 0).collect();
            let dir = directory_with(&humans, &[]);
            for slot in 0..MAX_SLOTS {
                assert!(responsible_for(&dir, slot).is_some());
            }
        }
    }

    #[test]
    fn test_recomputed_after_leave() {
        let mut dir = directory_with(&[0, 4], &[5]);
        assert_eq!(responsible_slot(&dir, 5), Some(4));
        dir.release(4);
        assert_eq!(responsible_slot(&dir, 5), Some(0));
    }

    #[test]
    fn test_my_responsibility() {
        let dir = directory_with(&[0, 4], &[2, 6]);
        let host = PeerHandle(100);
        let guest = PeerHandle(104);
        assert!(my_responsibility(&dir, 2, host));
        assert!(!my_responsibility(&dir, 2, guest));
        assert!(my_responsibility(&dir, 6, guest));
        assert!(is_responsible(&dir, 4, 6));
        assert!(!is_responsible(&dir, 0, 6));
    }

    #[test]
    fn test_out_of_range_slot() {
        let dir = directory_with(&[0], &[]);
        assert_eq!(responsible_for(&dir, MAX_SLOTS), None);
    }
}
