//! Shared application state.

use std::sync::Arc;

use storyloom_core::clock::Clock;
use storyloom_narrative::application::orchestrator::TurnOrchestrator;
use storyloom_world_state::domain::repository::CampaignRepository;

use crate::sessions::SessionRegistry;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Clock for timestamps (injectable for deterministic testing).
    pub clock: Arc<dyn Clock>,
    /// Campaign persistence.
    pub repository: Arc<dyn CampaignRepository>,
    /// Runs turns.
    pub orchestrator: Arc<TurnOrchestrator>,
    /// Live campaign sessions.
    pub sessions: SessionRegistry,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("orchestrator", &self.orchestrator)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        repository: Arc<dyn CampaignRepository>,
        orchestrator: TurnOrchestrator,
    ) -> Self {
        Self {
            clock,
            repository,
            orchestrator: Arc::new(orchestrator),
            sessions: SessionRegistry::new(),
        }
    }
}
