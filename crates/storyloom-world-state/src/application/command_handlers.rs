//! Command handlers for the World State context.

use storyloom_core::error::DomainError;
use tracing::info;
use uuid::Uuid;

use crate::domain::aggregates::{Campaign, Character};
use crate::domain::commands::CreateCampaign;
use crate::domain::repository::CampaignRepository;

/// Handles the `CreateCampaign` command: builds the player and the campaign
/// and persists the initial snapshot.
///
/// The handler generates the `campaign_id`.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the player name or start scenario is
/// blank, or `DomainError` if saving fails.
pub async fn handle_create_campaign(
    command: &CreateCampaign,
    repo: &dyn CampaignRepository,
) -> Result<Campaign, DomainError> {
    let player_name = command.player_name.trim();
    if player_name.is_empty() {
        return Err(DomainError::Validation(
            "player name must not be empty".to_owned(),
        ));
    }
    let start_scenario = command.start_scenario.trim();
    if start_scenario.is_empty() {
        return Err(DomainError::Validation(
            "start scenario must not be empty".to_owned(),
        ));
    }

    let player = Character::new_player(
        Uuid::new_v4(),
        player_name,
        command.player_description.trim(),
    );
    let campaign = Campaign::new(Uuid::new_v4(), player, start_scenario);

    repo.save(&campaign).await?;

    info!(
        correlation_id = %command.correlation_id,
        campaign_id = %campaign.id,
        "campaign created"
    );
    Ok(campaign)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use storyloom_core::error::DomainError;
    use uuid::Uuid;

    use crate::application::command_handlers::handle_create_campaign;
    use crate::domain::aggregates::Campaign;
    use crate::domain::commands::CreateCampaign;
    use crate::domain::repository::CampaignRepository;

    #[derive(Debug, Default)]
    struct MockCampaignRepository {
        saved: Mutex<Vec<Campaign>>,
    }

    #[async_trait]
    impl CampaignRepository for MockCampaignRepository {
        async fn load(&self, _campaign_id: Uuid) -> Result<Option<Campaign>, DomainError> {
            Ok(None)
        }

        async fn save(&self, campaign: &Campaign) -> Result<(), DomainError> {
            self.saved.lock().unwrap().push(campaign.clone());
            Ok(())
        }
    }

    fn command(player_name: &str, start_scenario: &str) -> CreateCampaign {
        CreateCampaign {
            correlation_id: Uuid::new_v4(),
            player_name: player_name.to_owned(),
            player_description: " A wandering knight ".to_owned(),
            start_scenario: start_scenario.to_owned(),
        }
    }

    #[tokio::test]
    async fn test_handle_create_campaign_persists_new_campaign() {
        // Arrange
        let repo = MockCampaignRepository::default();

        // Act
        let campaign = handle_create_campaign(&command("Aria", "A dark forest."), &repo)
            .await
            .unwrap();

        // Assert
        let saved = repo.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, campaign.id);
        assert_eq!(campaign.player().name, "Aria");
        assert_eq!(campaign.player().description, "A wandering knight");
        assert!(campaign.player().is_player);
        assert_eq!(campaign.start_scenario(), "A dark forest.");
        assert!(!campaign.combat_mode());
    }

    #[tokio::test]
    async fn test_handle_create_campaign_rejects_blank_player_name() {
        let repo = MockCampaignRepository::default();

        let result = handle_create_campaign(&command("   ", "A dark forest."), &repo).await;

        match result.unwrap_err() {
            DomainError::Validation(msg) => assert_eq!(msg, "player name must not be empty"),
            other => panic!("expected Validation, got {other:?}"),
        }
        assert!(repo.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handle_create_campaign_rejects_blank_scenario() {
        let repo = MockCampaignRepository::default();

        let result = handle_create_campaign(&command("Aria", ""), &repo).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }
}
