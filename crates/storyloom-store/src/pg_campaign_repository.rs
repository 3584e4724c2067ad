//! `PostgreSQL` implementation of the `CampaignRepository` trait.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::debug;
use uuid::Uuid;

use storyloom_core::error::DomainError;
use storyloom_world_state::domain::aggregates::Campaign;
use storyloom_world_state::domain::repository::CampaignRepository;

/// PostgreSQL-backed campaign repository storing one JSONB snapshot per
/// campaign.
#[derive(Debug, Clone)]
pub struct PgCampaignRepository {
    pool: PgPool,
}

impl PgCampaignRepository {
    /// Creates a new `PgCampaignRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignRepository for PgCampaignRepository {
    async fn load(&self, campaign_id: Uuid) -> Result<Option<Campaign>, DomainError> {
        let row: Option<(Json<Campaign>,)> =
            sqlx::query_as("SELECT snapshot FROM campaigns WHERE campaign_id = $1")
                .bind(campaign_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DomainError::Infrastructure(format!("failed to load campaign: {e}")))?;

        Ok(row.map(|(Json(campaign),)| campaign))
    }

    async fn save(&self, campaign: &Campaign) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO campaigns (campaign_id, snapshot, updated_at) \
             VALUES ($1, $2, NOW()) \
             ON CONFLICT (campaign_id) \
             DO UPDATE SET snapshot = EXCLUDED.snapshot, updated_at = NOW()",
        )
        .bind(campaign.id)
        .bind(Json(campaign))
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::Infrastructure(format!("failed to save campaign: {e}")))?;

        debug!(campaign_id = %campaign.id, "campaign snapshot saved");
        Ok(())
    }
}
