//! Live campaign sessions.
//!
//! Each campaign the server has touched gets one session holding the
//! campaign and its conversation behind an async mutex. A turn holds that
//! lock from start to finish, so double submits run one after the other.

use std::collections::HashMap;
use std::sync::Arc;

use storyloom_core::clock::Clock;
use storyloom_core::error::DomainError;
use storyloom_core::message::{Conversation, Message, Role};
use storyloom_narrative::application::dispatcher::EventDispatcher;
use storyloom_narrative::application::orchestrator::{TurnOrchestrator, TurnOutcome};
use storyloom_world_state::domain::aggregates::Campaign;
use storyloom_world_state::domain::repository::CampaignRepository;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

/// A campaign and the conversation played in it.
#[derive(Debug, Clone)]
pub struct CampaignSession {
    /// World state.
    pub campaign: Campaign,
    /// Transcript.
    pub conversation: Conversation,
}

impl CampaignSession {
    /// Opens a session whose transcript starts with the campaign's opening
    /// scenario as a system message.
    #[must_use]
    pub fn open(campaign: Campaign, clock: &dyn Clock) -> Self {
        let mut conversation = Conversation::new();
        conversation.push(Message::new(
            Role::System,
            campaign.start_scenario(),
            clock.now(),
        ));
        Self {
            campaign,
            conversation,
        }
    }

    /// Plays one turn. A failed turn leaves the session exactly as it was.
    ///
    /// # Errors
    ///
    /// Propagates the orchestrator's error.
    pub async fn take_turn(
        &mut self,
        orchestrator: &TurnOrchestrator,
        prompt: &str,
        dispatcher: &EventDispatcher,
    ) -> Result<TurnOutcome, DomainError> {
        let snapshot = self.clone();
        let result = orchestrator
            .handle_user_prompt(&mut self.campaign, &mut self.conversation, prompt, dispatcher)
            .await;
        if let Err(e) = &result {
            warn!(campaign_id = %self.campaign.id, error = %e, "turn failed; session rolled back");
            *self = snapshot;
        }
        result
    }
}

/// Shared handle to one session.
pub type SharedSession = Arc<Mutex<CampaignSession>>;

/// All live sessions, keyed by campaign id.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, SharedSession>>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly created campaign.
    pub async fn open(&self, campaign: Campaign, clock: &dyn Clock) -> SharedSession {
        let id = campaign.id;
        let session = Arc::new(Mutex::new(CampaignSession::open(campaign, clock)));
        self.sessions.write().await.insert(id, Arc::clone(&session));
        session
    }

    /// Returns the live session, if the campaign has one.
    pub async fn get(&self, campaign_id: Uuid) -> Option<SharedSession> {
        self.sessions.read().await.get(&campaign_id).cloned()
    }

    /// Returns the live session, reopening it from the repository when the
    /// server has not seen the campaign since it started.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CampaignNotFound` if the campaign does not
    /// exist, or the repository's error.
    pub async fn get_or_load(
        &self,
        campaign_id: Uuid,
        repository: &dyn CampaignRepository,
        clock: &dyn Clock,
    ) -> Result<SharedSession, DomainError> {
        if let Some(session) = self.get(campaign_id).await {
            return Ok(session);
        }

        let campaign = repository
            .load(campaign_id)
            .await?
            .ok_or(DomainError::CampaignNotFound(campaign_id))?;
        debug!(%campaign_id, "reopening session from stored campaign");

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(campaign_id)
            .or_insert_with(|| Arc::new(Mutex::new(CampaignSession::open(campaign, clock))));
        Ok(Arc::clone(session))
    }
}
