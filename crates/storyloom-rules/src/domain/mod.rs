//! Combat resolution domain.

pub mod damage;
pub mod outcome;
pub mod resolver;

pub use damage::{Damage, DamageRange, PLAYER_DAMAGE, opponent_damage_range};
pub use outcome::{CombatOutcome, OPPONENT_HIT_THRESHOLD, PLAYER_HIT_THRESHOLD};
pub use resolver::{CombatExchange, CombatResolver, CombatRules};
