//! Campaign repository abstraction.

use async_trait::async_trait;
use storyloom_core::error::DomainError;
use uuid::Uuid;

use super::aggregates::Campaign;

/// Repository trait for loading and saving campaign snapshots.
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    /// Load a campaign, or `None` if it has never been saved.
    async fn load(&self, campaign_id: Uuid) -> Result<Option<Campaign>, DomainError>;

    /// Persist the campaign, replacing any previous snapshot.
    async fn save(&self, campaign: &Campaign) -> Result<(), DomainError>;
}
