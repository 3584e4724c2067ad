//! Test repositories — mock `CampaignRepository` implementations for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use storyloom_core::error::DomainError;
use storyloom_world_state::domain::aggregates::Campaign;
use storyloom_world_state::domain::repository::CampaignRepository;
use uuid::Uuid;

/// A campaign repository that keeps the latest snapshot per campaign and
/// records every `save` call in order.
#[derive(Debug, Default)]
pub struct RecordingCampaignRepository {
    campaigns: Mutex<HashMap<Uuid, Campaign>>,
    saved: Mutex<Vec<Campaign>>,
}

impl RecordingCampaignRepository {
    /// Create an empty recording repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every campaign passed to `save`, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn saved_campaigns(&self) -> Vec<Campaign> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl CampaignRepository for RecordingCampaignRepository {
    async fn load(&self, campaign_id: Uuid) -> Result<Option<Campaign>, DomainError> {
        Ok(self.campaigns.lock().unwrap().get(&campaign_id).cloned())
    }

    async fn save(&self, campaign: &Campaign) -> Result<(), DomainError> {
        self.campaigns
            .lock()
            .unwrap()
            .insert(campaign.id, campaign.clone());
        self.saved.lock().unwrap().push(campaign.clone());
        Ok(())
    }
}

/// A campaign repository that always returns an infrastructure error. Useful
/// for testing error-handling paths.
#[derive(Debug)]
pub struct FailingCampaignRepository;

#[async_trait]
impl CampaignRepository for FailingCampaignRepository {
    async fn load(&self, _campaign_id: Uuid) -> Result<Option<Campaign>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn save(&self, _campaign: &Campaign) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
