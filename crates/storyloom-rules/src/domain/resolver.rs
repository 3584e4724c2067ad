//! Combat resolver.
//!
//! Two independent uniform rolls decide who hits; each hit then draws its
//! damage from the attacker's table. No hidden state: the same RNG sequence
//! always yields the same exchange.

use serde::{Deserialize, Serialize};
use storyloom_core::error::DomainError;
use storyloom_core::rng::DeterministicRng;
use storyloom_world_state::domain::aggregates::CharacterType;

use super::damage::{Damage, DamageRange, PLAYER_DAMAGE, opponent_damage_range};
use super::outcome::{CombatOutcome, OPPONENT_HIT_THRESHOLD, PLAYER_HIT_THRESHOLD};

/// Tunable combat parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombatRules {
    /// Minimum roll for the player to hit.
    pub player_hit_threshold: f64,
    /// Minimum roll for the opponent to hit.
    pub opponent_hit_threshold: f64,
    /// Damage the player deals on a hit.
    pub player_damage: DamageRange,
}

impl Default for CombatRules {
    fn default() -> Self {
        Self {
            player_hit_threshold: PLAYER_HIT_THRESHOLD,
            opponent_hit_threshold: OPPONENT_HIT_THRESHOLD,
            player_damage: PLAYER_DAMAGE,
        }
    }
}

impl CombatRules {
    /// Checks thresholds lie in `[0, 1]` and the damage range is non-empty.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` describing the first bad value.
    pub fn validate(&self) -> Result<(), DomainError> {
        for (name, value) in [
            ("player hit threshold", self.player_hit_threshold),
            ("opponent hit threshold", self.opponent_hit_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DomainError::Validation(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.player_damage.max <= self.player_damage.min {
            return Err(DomainError::Validation(
                "player damage range must not be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Outcome and damage of one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatExchange {
    /// Who hit.
    pub outcome: CombatOutcome,
    /// How hard.
    pub damage: Damage,
}

/// Resolves combat exchanges under a fixed set of rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct CombatResolver {
    rules: CombatRules,
}

impl CombatResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new(rules: CombatRules) -> Self {
        Self { rules }
    }

    /// The rules in force.
    #[must_use]
    pub fn rules(&self) -> &CombatRules {
        &self.rules
    }

    /// Rolls for both sides: player first, then opponent.
    pub fn determine_outcome(&self, rng: &mut dyn DeterministicRng) -> CombatOutcome {
        let player_roll = rng.next_f64();
        let opponent_roll = rng.next_f64();
        CombatOutcome::from_hits(
            player_roll >= self.rules.player_hit_threshold,
            opponent_roll >= self.rules.opponent_hit_threshold,
        )
    }

    /// Draws damage for each side that hit; a miss deals zero.
    pub fn compute_damage(
        &self,
        outcome: CombatOutcome,
        opponent_type: CharacterType,
        rng: &mut dyn DeterministicRng,
    ) -> Damage {
        let player_damage = if outcome.player_hits() {
            roll(self.rules.player_damage, rng)
        } else {
            0
        };
        let opponent_damage = if outcome.opponent_hits() {
            roll(opponent_damage_range(opponent_type), rng)
        } else {
            0
        };
        Damage {
            player_damage,
            opponent_damage,
        }
    }

    /// Determines the outcome and its damage in one go.
    pub fn resolve(
        &self,
        opponent_type: CharacterType,
        rng: &mut dyn DeterministicRng,
    ) -> CombatExchange {
        let outcome = self.determine_outcome(rng);
        let damage = self.compute_damage(outcome, opponent_type, rng);
        CombatExchange { outcome, damage }
    }
}

/// Draws from `[min, max)`.
fn roll(range: DamageRange, rng: &mut dyn DeterministicRng) -> u32 {
    if range.max <= range.min {
        return range.min;
    }
    rng.next_u32_range(range.min, range.max - 1)
}
