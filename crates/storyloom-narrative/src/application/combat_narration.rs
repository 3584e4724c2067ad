//! System prompt selection and combat narration.
//!
//! Outside combat the default template passes straight through. In combat
//! the model is first asked who the player is fighting; the exchange is then
//! resolved, health is adjusted and a transient system message describing
//! the mechanics is appended before any narration is requested.

use std::sync::Mutex;

use storyloom_core::clock::Clock;
use storyloom_core::error::DomainError;
use storyloom_core::message::{Conversation, Message};
use storyloom_core::narration::NarrationClient;
use storyloom_core::rng::DeterministicRng;
use storyloom_rules::domain::{CombatExchange, CombatOutcome, CombatResolver};
use storyloom_world_state::domain::aggregates::{Campaign, HealthChange};
use storyloom_world_state::domain::payload::NarrationPayload;
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::prompts::{PromptTemplates, SystemPromptType};

/// A resolved combat exchange as applied to the campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedExchange {
    /// The opponent's id.
    pub opponent_id: Uuid,
    /// The opponent's name.
    pub opponent_name: String,
    /// Rolls and damage.
    pub exchange: CombatExchange,
    /// Opponent health transition.
    pub opponent_health: HealthChange,
    /// Player health transition.
    pub player_health: HealthChange,
}

/// The template chosen for the next narration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSelection {
    /// Template to narrate with.
    pub prompt_type: SystemPromptType,
    /// The exchange, when combat was resolved this turn.
    pub exchange: Option<AppliedExchange>,
    /// Whether the player died; the turn then produces closing narration.
    pub player_died: bool,
}

impl PromptSelection {
    fn default_template() -> Self {
        Self {
            prompt_type: SystemPromptType::Default,
            exchange: None,
            player_died: false,
        }
    }
}

/// Collaborators needed to resolve a combat turn.
#[derive(Clone, Copy)]
pub struct CombatContext<'a> {
    /// The narration model.
    pub narration: &'a dyn NarrationClient,
    /// Instruction templates.
    pub templates: &'a PromptTemplates,
    /// Combat rules.
    pub resolver: &'a CombatResolver,
    /// Injected randomness.
    pub rng: &'a Mutex<dyn DeterministicRng + Send>,
    /// Timestamps for synthesized messages.
    pub clock: &'a dyn Clock,
}

/// Chooses the template for the next narration request, resolving a combat
/// exchange first when the campaign is in combat.
///
/// All campaign and conversation mutation happens before this returns.
///
/// # Errors
///
/// Returns `DomainError::Narration` if the opponent-description request
/// fails, or `DomainError::Infrastructure` if the RNG mutex is poisoned.
/// An unidentifiable opponent is not an error: combat is abandoned and the
/// default template is selected.
pub async fn select_system_prompt(
    context: CombatContext<'_>,
    campaign: &mut Campaign,
    conversation: &mut Conversation,
) -> Result<PromptSelection, DomainError> {
    if !campaign.combat_mode() {
        return Ok(PromptSelection::default_template());
    }

    let description = context
        .narration
        .get_chat_completion(
            conversation,
            context
                .templates
                .get(SystemPromptType::CombatOpponentDescription),
        )
        .await?;
    let payload = NarrationPayload::parse(&description);

    for entry in &payload.characters {
        campaign.upsert_character(
            &entry.name,
            entry.description.as_deref(),
            entry.character_type,
        );
    }

    let opponent = payload
        .opponent_name()
        .and_then(|name| campaign.find_opponent(name))
        .map(|c| (c.id, c.name.clone(), c.character_type));
    let Some((opponent_id, opponent_name, opponent_type)) = opponent else {
        error!(
            campaign_id = %campaign.id,
            reported = ?payload.opponent_name(),
            "could not identify combat opponent; leaving combat"
        );
        campaign.set_combat_mode(false);
        return Ok(PromptSelection::default_template());
    };

    // Never hold the RNG lock across an await.
    let exchange = {
        let mut rng = context
            .rng
            .lock()
            .map_err(|e| DomainError::Infrastructure(format!("RNG mutex poisoned: {e}")))?;
        context.resolver.resolve(opponent_type, &mut *rng)
    };

    let opponent_health = campaign.damage_character(opponent_id, exchange.damage.player_damage)?;
    let player_health = campaign.damage_player(exchange.damage.opponent_damage);
    info!(
        campaign_id = %campaign.id,
        opponent = %opponent_name,
        outcome = %exchange.outcome,
        player_damage = exchange.damage.player_damage,
        opponent_damage = exchange.damage.opponent_damage,
        player_health = player_health.after,
        opponent_health = opponent_health.after,
        "combat damage applied"
    );

    let applied = AppliedExchange {
        opponent_id,
        opponent_name,
        exchange,
        opponent_health,
        player_health,
    };

    let now = context.clock.now();
    conversation.push(Message::transient_system(
        describe_exchange(campaign, &applied),
        now,
    ));

    if opponent_health.died {
        campaign.set_combat_mode(false);
    }

    if player_health.died {
        conversation.push(Message::transient_system(
            format!(
                "{} has died and can take no further actions. Narrate the end of their story.",
                campaign.player().name
            ),
            now,
        ));
        campaign.set_combat_mode(false);
        return Ok(PromptSelection {
            prompt_type: SystemPromptType::Default,
            exchange: Some(applied),
            player_died: true,
        });
    }

    Ok(PromptSelection {
        prompt_type: SystemPromptType::for_outcome(applied.exchange.outcome),
        exchange: Some(applied),
        player_died: false,
    })
}

/// Renders the mechanical outcome of an exchange for the model.
fn describe_exchange(campaign: &Campaign, applied: &AppliedExchange) -> String {
    let player = campaign.player();
    let opponent = &applied.opponent_name;
    let damage = applied.exchange.damage;
    let opponent_max = campaign
        .character(applied.opponent_id)
        .map_or(applied.opponent_health.before, |c| c.max_health());

    let mut lines = vec![format!(
        "Combat round against {opponent} ({}).",
        outcome_label(applied.exchange.outcome)
    )];
    if applied.exchange.outcome.player_hits() {
        lines.push(format!(
            "{} hits {opponent} for {} damage ({opponent} health {}/{opponent_max}).",
            player.name, damage.player_damage, applied.opponent_health.after
        ));
    } else {
        lines.push(format!("{} misses {opponent}.", player.name));
    }
    if applied.exchange.outcome.opponent_hits() {
        lines.push(format!(
            "{opponent} hits {} for {} damage ({} health {}/{}).",
            player.name,
            damage.opponent_damage,
            player.name,
            applied.player_health.after,
            player.max_health()
        ));
    } else {
        lines.push(format!("{opponent} misses {}.", player.name));
    }
    if applied.opponent_health.died {
        lines.push(format!(
            "{opponent} dies and can no longer participate in the narrative."
        ));
    }
    lines.join(" ")
}

fn outcome_label(outcome: CombatOutcome) -> &'static str {
    match outcome {
        CombatOutcome::HitHit => "both sides hit",
        CombatOutcome::HitMiss => "only the player hits",
        CombatOutcome::MissHit => "only the opponent hits",
        CombatOutcome::MissMiss => "both sides miss",
    }
}
