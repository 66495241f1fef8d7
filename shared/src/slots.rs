//! Player slot limits and per-slot defaults.

/// Number of logical player positions in a session.
pub const MAX_SLOTS: usize = 8;

/// Smallest player cap a game type may declare.
pub const MIN_PLAYERS: u8 = 2;

/// Maximum display name length in bytes.
pub const MAX_PLAYER_NAME_LEN: usize = 32;

/// Maximum length of the session and map names carried in options.
pub const MAX_NAME_LEN: usize = 128;

/// Number of distinct structure-limit overrides a session may carry.
pub const MAX_STRUCTURE_LIMITS: usize = 64;

/// Number of steps on the AI difficulty slider.
pub const DIFFICULTY_STOPS: u8 = 20;

/// Difficulty value restored when a slot is vacated.
pub const NEUTRAL_DIFFICULTY: u8 = DIFFICULTY_STOPS / 2;

/// Difficulty value marking a slot as driven by a human.
pub const HUMAN_DIFFICULTY: u8 = u8::MAX;

/// Difficulty value marking a disabled (closed) slot.
pub const DISABLED_DIFFICULTY: u8 = 0;

/// Returns true if `slot` addresses a valid player position.
#[inline]
pub const fn is_valid_slot(slot: usize) -> bool {
    slot < MAX_SLOTS
}

/// Truncate a display name to [`MAX_PLAYER_NAME_LEN`] on a char boundary.
pub fn clamp_name(name: &str) -> String {
    if name.len() <= MAX_PLAYER_NAME_LEN {
        return name.to_string();
    }
    let mut end = MAX_PLAYER_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_slots() {
        assert!(is_valid_slot(0));
        assert!(is_valid_slot(MAX_SLOTS - 1));
        assert!(!is_valid_slot(MAX_SLOTS));
    }

    #[test]
    fn test_clamp_name_short() {
        assert_eq!(clamp_name("Commander"), "Commander");
    }

    #[test]
    fn test_clamp_name_multibyte() {
        let long = "é".repeat(40);
        let clamped = clamp_name(&long);
        assert!(clamped.len() <= MAX_PLAYER_NAME_LEN);
        assert!(clamped.chars().all(|c| c == 'é'));
    }
}
