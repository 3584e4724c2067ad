//! World state synchronization.
//!
//! Pulls structured facts out of narration text, applies them to the campaign
//! and persists the result.

use std::sync::Arc;

use async_trait::async_trait;
use storyloom_core::error::DomainError;
use storyloom_core::message::Message;
use tracing::{debug, info};

use crate::domain::aggregates::Campaign;
use crate::domain::payload::NarrationPayload;
use crate::domain::repository::CampaignRepository;

/// Summary of what a message changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateChanges {
    /// Characters created or updated.
    pub characters_upserted: usize,
    /// Whether the current environment changed or was refreshed.
    pub environment_changed: bool,
    /// New combat flag, when the message set one.
    pub combat_mode: Option<bool>,
}

impl StateChanges {
    /// Returns `true` when nothing was applied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Keeps persistent campaign state in step with the narration.
#[async_trait]
pub trait WorldStateSynchronizer: Send + Sync {
    /// Extracts facts from a message and applies them to the campaign.
    fn update_state_from_message(&self, campaign: &mut Campaign, message: &Message)
    -> StateChanges;

    /// Persists the campaign.
    async fn save_current_state(&self, campaign: &Campaign) -> Result<(), DomainError>;
}

/// Applies a parsed payload to a campaign.
///
/// The environment is applied first so newly mentioned characters are placed
/// in it. A concluded campaign never re-enters combat.
pub fn apply_payload(campaign: &mut Campaign, payload: &NarrationPayload) -> StateChanges {
    let mut changes = StateChanges::default();

    if let Some(environment) = &payload.environment {
        campaign.enter_environment(&environment.name, environment.description.as_deref());
        changes.environment_changed = true;
    }

    for entry in &payload.characters {
        campaign.upsert_character(
            &entry.name,
            entry.description.as_deref(),
            entry.character_type,
        );
        changes.characters_upserted += 1;
    }

    if let Some(in_combat) = payload.is_in_combat {
        if !campaign.is_concluded() {
            campaign.set_combat_mode(in_combat);
            changes.combat_mode = Some(in_combat);
        }
    }

    changes
}

/// Default synchronizer backed by a `CampaignRepository`.
#[derive(Clone)]
pub struct GameStateManager {
    repository: Arc<dyn CampaignRepository>,
}

impl GameStateManager {
    /// Creates a new `GameStateManager`.
    #[must_use]
    pub fn new(repository: Arc<dyn CampaignRepository>) -> Self {
        Self { repository }
    }
}

impl std::fmt::Debug for GameStateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameStateManager").finish_non_exhaustive()
    }
}

#[async_trait]
impl WorldStateSynchronizer for GameStateManager {
    fn update_state_from_message(
        &self,
        campaign: &mut Campaign,
        message: &Message,
    ) -> StateChanges {
        let payload = NarrationPayload::parse(message.content());
        if payload.is_empty() {
            debug!(campaign_id = %campaign.id, role = message.role().as_str(), "no structured facts in message");
            return StateChanges::default();
        }

        let changes = apply_payload(campaign, &payload);
        info!(
            campaign_id = %campaign.id,
            characters = changes.characters_upserted,
            environment_changed = changes.environment_changed,
            combat_mode = ?changes.combat_mode,
            "applied world state from message"
        );
        changes
    }

    async fn save_current_state(&self, campaign: &Campaign) -> Result<(), DomainError> {
        self.repository.save(campaign).await
    }
}
