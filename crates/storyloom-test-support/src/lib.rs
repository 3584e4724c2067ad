//! Shared test mocks and utilities for the Storyloom narrative engine.

mod clock;
mod narration;
mod repository;
mod rng;

pub use clock::FixedClock;
pub use narration::{FailingNarrationClient, NarrationCall, ScriptedNarrationClient};
pub use repository::{FailingCampaignRepository, RecordingCampaignRepository};
pub use rng::{MockRng, SequenceRng};
