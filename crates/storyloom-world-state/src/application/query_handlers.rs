//! Query handlers for the World State context.
//!
//! This module contains query handlers that load campaign snapshots and
//! return read-only view DTOs.

use serde::Serialize;
use storyloom_core::error::DomainError;
use uuid::Uuid;

use crate::domain::aggregates::{Campaign, Character, CharacterType, Environment};
use crate::domain::repository::CampaignRepository;

/// Read-only view of a character.
#[derive(Debug, Serialize)]
pub struct CharacterView {
    /// The character identifier.
    pub character_id: Uuid,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Physical class.
    pub character_type: CharacterType,
    /// Current health.
    pub current_health: u32,
    /// Maximum health.
    pub max_health: u32,
    /// Whether the character has died.
    pub is_dead: bool,
    /// Name of the environment the character was last seen in.
    pub location: Option<String>,
}

/// Read-only view of an environment.
#[derive(Debug, Serialize)]
pub struct EnvironmentView {
    /// The environment identifier.
    pub environment_id: Uuid,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
}

/// Read-only view of a campaign aggregate.
#[derive(Debug, Serialize)]
pub struct CampaignView {
    /// The campaign identifier.
    pub campaign_id: Uuid,
    /// The player character.
    pub player: CharacterView,
    /// Non-player characters, oldest first.
    pub characters: Vec<CharacterView>,
    /// Visited environments; the last is the current one.
    pub environments: Vec<EnvironmentView>,
    /// Whether a combat encounter is active.
    pub combat_mode: bool,
    /// Whether the campaign has ended.
    pub concluded: bool,
    /// Opening scenario.
    pub start_scenario: String,
}

impl CampaignView {
    /// Builds a view from a campaign snapshot.
    #[must_use]
    pub fn from_campaign(campaign: &Campaign) -> Self {
        let character_view = |character: &Character| CharacterView {
            character_id: character.id,
            name: character.name.clone(),
            description: character.description.clone(),
            character_type: character.character_type,
            current_health: character.current_health(),
            max_health: character.max_health(),
            is_dead: character.is_dead(),
            location: campaign.location_of(character.id).map(|e| e.name.clone()),
        };
        let environment_view = |environment: &Environment| EnvironmentView {
            environment_id: environment.id,
            name: environment.name.clone(),
            description: environment.description.clone(),
        };

        Self {
            campaign_id: campaign.id,
            player: character_view(campaign.player()),
            characters: campaign.characters().iter().map(character_view).collect(),
            environments: campaign
                .environments()
                .iter()
                .map(environment_view)
                .collect(),
            combat_mode: campaign.combat_mode(),
            concluded: campaign.is_concluded(),
            start_scenario: campaign.start_scenario().to_owned(),
        }
    }
}

/// Retrieves a campaign by its aggregate ID.
///
/// # Errors
///
/// Returns `DomainError::CampaignNotFound` if no snapshot exists for the ID.
pub async fn get_campaign_by_id(
    campaign_id: Uuid,
    repo: &dyn CampaignRepository,
) -> Result<CampaignView, DomainError> {
    let campaign = repo
        .load(campaign_id)
        .await?
        .ok_or(DomainError::CampaignNotFound(campaign_id))?;
    Ok(CampaignView::from_campaign(&campaign))
}
