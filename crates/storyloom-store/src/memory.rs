//! In-process campaign repository.

use std::collections::HashMap;

use async_trait::async_trait;
use storyloom_core::error::DomainError;
use storyloom_world_state::domain::aggregates::Campaign;
use storyloom_world_state::domain::repository::CampaignRepository;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Keeps the latest snapshot of each campaign in memory. Contents are lost
/// when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryCampaignRepository {
    campaigns: RwLock<HashMap<Uuid, Campaign>>,
}

impl InMemoryCampaignRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CampaignRepository for InMemoryCampaignRepository {
    async fn load(&self, campaign_id: Uuid) -> Result<Option<Campaign>, DomainError> {
        Ok(self.campaigns.read().await.get(&campaign_id).cloned())
    }

    async fn save(&self, campaign: &Campaign) -> Result<(), DomainError> {
        self.campaigns
            .write()
            .await
            .insert(campaign.id, campaign.clone());
        Ok(())
    }
}
