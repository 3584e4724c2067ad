//! Hit/miss outcome of a combat exchange.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Minimum roll in `[0, 1)` for the player to land a hit.
pub const PLAYER_HIT_THRESHOLD: f64 = 0.3;

/// Minimum roll in `[0, 1)` for the opponent to land a hit.
pub const OPPONENT_HIT_THRESHOLD: f64 = 0.5;

/// Outcome of one exchange, named player-side first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatOutcome {
    /// Both sides hit.
    HitHit,
    /// Only the player hits.
    HitMiss,
    /// Only the opponent hits.
    MissHit,
    /// Nobody hits.
    MissMiss,
}

impl CombatOutcome {
    /// Builds an outcome from the two hit flags.
    #[must_use]
    pub fn from_hits(player_hits: bool, opponent_hits: bool) -> Self {
        match (player_hits, opponent_hits) {
            (true, true) => Self::HitHit,
            (true, false) => Self::HitMiss,
            (false, true) => Self::MissHit,
            (false, false) => Self::MissMiss,
        }
    }

    /// Whether the player lands a hit.
    #[must_use]
    pub fn player_hits(self) -> bool {
        matches!(self, Self::HitHit | Self::HitMiss)
    }

    /// Whether the opponent lands a hit.
    #[must_use]
    pub fn opponent_hits(self) -> bool {
        matches!(self, Self::HitHit | Self::MissHit)
    }
}

impl fmt::Display for CombatOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::HitHit => "HitHit",
            Self::HitMiss => "HitMiss",
            Self::MissHit => "MissHit",
            Self::MissMiss => "MissMiss",
        };
        f.write_str(name)
    }
}
