//! Campaign persistence for the Storyloom narrative engine.
//!
//! Two `CampaignRepository` adapters: an in-process map for development and
//! tests, and a `PostgreSQL` table holding one JSONB snapshot per campaign.

pub mod memory;
pub mod pg_campaign_repository;
