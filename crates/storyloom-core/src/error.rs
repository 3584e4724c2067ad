//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A campaign was not found.
    #[error("campaign not found: {0}")]
    CampaignNotFound(Uuid),

    /// A character was not found in its campaign.
    #[error("character not found: {0}")]
    CharacterNotFound(Uuid),

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// The narration model could not be reached or failed mid-response.
    #[error("narration error: {0}")]
    Narration(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}
