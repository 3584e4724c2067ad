//! Damage tables.

use serde::{Deserialize, Serialize};
use storyloom_world_state::domain::aggregates::CharacterType;

/// A half-open damage range `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageRange {
    /// Smallest possible damage.
    pub min: u32,
    /// One past the largest possible damage.
    pub max: u32,
}

impl DamageRange {
    /// Creates a range; `max` is exclusive.
    #[must_use]
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Whether `value` falls inside the range.
    #[must_use]
    pub fn contains(self, value: u32) -> bool {
        (self.min..self.max).contains(&value)
    }
}

/// Damage the player deals on a hit.
pub const PLAYER_DAMAGE: DamageRange = DamageRange::new(10, 25);

/// Damage an opponent of the given type deals on a hit.
#[must_use]
pub fn opponent_damage_range(opponent_type: CharacterType) -> DamageRange {
    match opponent_type {
        CharacterType::SmallCreature => DamageRange::new(1, 8),
        CharacterType::Humanoid => DamageRange::new(5, 15),
        CharacterType::LargeCreature => DamageRange::new(10, 20),
        CharacterType::Monster => DamageRange::new(15, 30),
    }
}

/// Damage produced by one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Damage {
    /// Dealt by the player to the opponent.
    pub player_damage: u32,
    /// Dealt by the opponent to the player.
    pub opponent_damage: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opponent_ranges_grow_with_creature_size() {
        let ranges: Vec<DamageRange> = CharacterType::ALL
            .iter()
            .map(|t| opponent_damage_range(*t))
            .collect();

        for pair in ranges.windows(2) {
            assert!(pair[0].min <= pair[1].min);
            assert!(pair[0].max <= pair[1].max);
        }
    }

    #[test]
    fn test_contains_excludes_upper_bound() {
        assert!(PLAYER_DAMAGE.contains(10));
        assert!(PLAYER_DAMAGE.contains(24));
        assert!(!PLAYER_DAMAGE.contains(25));
        assert!(!PLAYER_DAMAGE.contains(9));
    }
}
