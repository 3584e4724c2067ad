//! Commands for the World State context.

use uuid::Uuid;

/// Command to start a new campaign.
#[derive(Debug, Clone)]
pub struct CreateCampaign {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The player character's name.
    pub player_name: String,
    /// The player character's description.
    pub player_description: String,
    /// Opening scenario handed to the narrator.
    pub start_scenario: String,
}
