//! Turn orchestrator.
//!
//! One player prompt in, one assistant message out. A turn runs as a single
//! sequential pipeline: sync the prompt into world state, pick the system
//! prompt (resolving combat if needed), narrate, sync the narration, persist.

use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use storyloom_core::clock::Clock;
use storyloom_core::error::DomainError;
use storyloom_core::message::{Conversation, Message};
use storyloom_core::narration::NarrationClient;
use storyloom_core::rng::DeterministicRng;
use storyloom_rules::domain::CombatResolver;
use storyloom_world_state::application::synchronizer::WorldStateSynchronizer;
use storyloom_world_state::domain::aggregates::Campaign;
use tracing::{debug, info, instrument, warn};

use super::combat_narration::{CombatContext, PromptSelection, select_system_prompt};
use super::dispatcher::EventDispatcher;
use crate::domain::events::TurnEvent;
use crate::domain::prompts::{PromptTemplates, SystemPromptType};

/// How narration is delivered, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnConfig {
    /// Stream fragments instead of waiting for the full completion.
    pub streaming: bool,
}

impl TurnConfig {
    /// Mock responses always disable streaming.
    #[must_use]
    pub fn resolve(streaming_enabled: bool, use_mock_responses: bool) -> Self {
        Self {
            streaming: streaming_enabled && !use_mock_responses,
        }
    }
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self { streaming: true }
    }
}

/// Result of handling one player prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The prompt was blank; nothing happened.
    Skipped,
    /// The model narrated the turn.
    Narrated {
        /// The new assistant message.
        message: Message,
        /// Template the narration was requested with.
        prompt_type: SystemPromptType,
        /// Whether the player died this turn, concluding the campaign.
        player_died: bool,
    },
}

/// Runs turns against a campaign and its conversation.
///
/// The orchestrator assumes exclusive access to the pair for the duration of
/// a turn; callers serialize concurrent turns per campaign.
pub struct TurnOrchestrator {
    narration: Arc<dyn NarrationClient>,
    synchronizer: Arc<dyn WorldStateSynchronizer>,
    templates: Arc<PromptTemplates>,
    resolver: CombatResolver,
    rng: Arc<Mutex<dyn DeterministicRng + Send>>,
    clock: Arc<dyn Clock>,
    config: TurnConfig,
}

impl std::fmt::Debug for TurnOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnOrchestrator")
            .field("resolver", &self.resolver)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TurnOrchestrator {
    /// Creates an orchestrator with default combat rules and streaming on.
    #[must_use]
    pub fn new(
        narration: Arc<dyn NarrationClient>,
        synchronizer: Arc<dyn WorldStateSynchronizer>,
        templates: Arc<PromptTemplates>,
        rng: Arc<Mutex<dyn DeterministicRng + Send>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            narration,
            synchronizer,
            templates,
            resolver: CombatResolver::default(),
            rng,
            clock,
            config: TurnConfig::default(),
        }
    }

    /// Replaces the combat resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: CombatResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replaces the delivery configuration.
    #[must_use]
    pub fn with_config(mut self, config: TurnConfig) -> Self {
        self.config = config;
        self
    }

    /// The delivery configuration in force.
    #[must_use]
    pub fn config(&self) -> TurnConfig {
        self.config
    }

    /// Handles one player prompt.
    ///
    /// A blank prompt is skipped without touching state or the model.
    /// Otherwise exactly one assistant message is appended, the world state
    /// is synchronized from it and the campaign is persisted. Transient
    /// combat messages are stripped afterwards, whether the turn succeeded
    /// or not.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the campaign has concluded, and
    /// propagates narration and persistence failures.
    #[instrument(skip_all, fields(campaign_id = %campaign.id))]
    pub async fn handle_user_prompt(
        &self,
        campaign: &mut Campaign,
        conversation: &mut Conversation,
        prompt: &str,
        dispatcher: &EventDispatcher,
    ) -> Result<TurnOutcome, DomainError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            debug!("blank prompt; skipping turn");
            return Ok(TurnOutcome::Skipped);
        }
        if campaign.is_concluded() {
            return Err(DomainError::Validation(
                "campaign has concluded; no further turns are possible".to_owned(),
            ));
        }

        info!(combat_mode = campaign.combat_mode(), "turn started");
        let user_message = Message::user(prompt, self.clock.now());
        conversation.push(user_message.clone());
        self.synchronizer
            .update_state_from_message(campaign, &user_message);

        let result = self.run_turn(campaign, conversation, dispatcher).await;
        if result.is_err() && conversation.abandon_in_flight().is_some() {
            warn!("discarded partially streamed assistant message");
        }
        let stripped = conversation.strip_transient();
        let outcome = result?;

        if let TurnOutcome::Narrated {
            prompt_type,
            player_died,
            ..
        } = &outcome
        {
            info!(
                %prompt_type,
                player_died,
                transient_stripped = stripped,
                "turn finished"
            );
        }
        Ok(outcome)
    }

    async fn run_turn(
        &self,
        campaign: &mut Campaign,
        conversation: &mut Conversation,
        dispatcher: &EventDispatcher,
    ) -> Result<TurnOutcome, DomainError> {
        let context = CombatContext {
            narration: &*self.narration,
            templates: &self.templates,
            resolver: &self.resolver,
            rng: &*self.rng,
            clock: &*self.clock,
        };
        let PromptSelection {
            prompt_type,
            player_died,
            ..
        } = select_system_prompt(context, campaign, conversation).await?;

        let system_prompt = self.templates.get(prompt_type);
        let message = if self.config.streaming {
            self.narrate_streamed(conversation, system_prompt, dispatcher)
                .await?
        } else {
            self.narrate_buffered(conversation, system_prompt, dispatcher)
                .await?
        };

        self.synchronizer
            .update_state_from_message(campaign, &message);
        if player_died {
            campaign.conclude();
            info!("player died; campaign concluded");
        }
        self.synchronizer.save_current_state(campaign).await?;

        Ok(TurnOutcome::Narrated {
            message,
            prompt_type,
            player_died,
        })
    }

    async fn narrate_buffered(
        &self,
        conversation: &mut Conversation,
        system_prompt: &str,
        dispatcher: &EventDispatcher,
    ) -> Result<Message, DomainError> {
        let text = self
            .narration
            .get_chat_completion(conversation, system_prompt)
            .await?;
        let message = Message::assistant(text, self.clock.now());
        conversation.push(message.clone());
        dispatcher.emit(TurnEvent::MessageReceived {
            message: message.clone(),
        });
        Ok(message)
    }

    async fn narrate_streamed(
        &self,
        conversation: &mut Conversation,
        system_prompt: &str,
        dispatcher: &EventDispatcher,
    ) -> Result<Message, DomainError> {
        // The model sees the history without the empty placeholder.
        let history = conversation.clone();
        let started = conversation.begin_assistant(self.clock.now())?.clone();
        dispatcher.emit(TurnEvent::MessageStarted { message: started });

        let mut fragments = self
            .narration
            .get_streamed_chat_completion(&history, system_prompt)
            .await?;

        while let Some(fragment) = fragments.next().await {
            let fragment = fragment?;
            if fragment.is_empty() {
                continue;
            }
            conversation.append_to_in_flight(&fragment)?;
            dispatcher.emit(TurnEvent::chunk(fragment));
        }

        let message = conversation.finish_in_flight()?;
        dispatcher.emit(TurnEvent::done());
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use storyloom_core::message::Role;
    use storyloom_test_support::{
        FailingCampaignRepository, FailingNarrationClient, FixedClock, MockRng,
        RecordingCampaignRepository, ScriptedNarrationClient, SequenceRng,
    };
    use storyloom_world_state::application::synchronizer::GameStateManager;
    use storyloom_world_state::domain::aggregates::Character;
    use tokio::sync::mpsc::UnboundedReceiver;
    use uuid::Uuid;

    use super::*;

    struct Harness {
        orchestrator: TurnOrchestrator,
        client: Arc<ScriptedNarrationClient>,
        repo: Arc<RecordingCampaignRepository>,
    }

    fn harness(
        client: ScriptedNarrationClient,
        rng: impl DeterministicRng + Send + 'static,
        streaming: bool,
    ) -> Harness {
        let client = Arc::new(client);
        let repo = Arc::new(RecordingCampaignRepository::new());
        let rng: Arc<Mutex<dyn DeterministicRng + Send>> = Arc::new(Mutex::new(rng));
        let orchestrator = TurnOrchestrator::new(
            client.clone(),
            Arc::new(GameStateManager::new(repo.clone())),
            Arc::new(PromptTemplates::from_fn(|t| format!("template:{t}"))),
            rng,
            Arc::new(FixedClock::default()),
        )
        .with_config(TurnConfig { streaming });
        Harness {
            orchestrator,
            client,
            repo,
        }
    }

    fn campaign() -> Campaign {
        let player = Character::new_player(Uuid::new_v4(), "Aria", "A wandering knight");
        Campaign::new(Uuid::new_v4(), player, "You wake in a dark forest.")
    }

    fn drain(receiver: &mut UnboundedReceiver<TurnEvent>) -> Vec<TurnEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_streamed_turn_emits_start_chunks_then_done() {
        // Arrange
        let h = harness(
            ScriptedNarrationClient::new().with_stream(&["Once ", "", "upon", " a time"]),
            MockRng,
            true,
        );
        let mut campaign = campaign();
        let mut conversation = Conversation::new();
        let (dispatcher, mut receiver) = EventDispatcher::channel();

        // Act
        let outcome = h
            .orchestrator
            .handle_user_prompt(&mut campaign, &mut conversation, "Look around", &dispatcher)
            .await
            .unwrap();

        // Assert
        let events = drain(&mut receiver);
        assert_eq!(events.len(), 5);
        match &events[0] {
            TurnEvent::MessageStarted { message } => {
                assert_eq!(message.role(), Role::Assistant);
                assert!(message.content().is_empty());
            }
            other => panic!("expected MessageStarted, got {other:?}"),
        }
        assert_eq!(events[1], TurnEvent::chunk("Once "));
        assert_eq!(events[2], TurnEvent::chunk("upon"));
        assert_eq!(events[3], TurnEvent::chunk(" a time"));
        assert_eq!(events[4], TurnEvent::done());

        let concatenated: String = events
            .iter()
            .filter_map(|e| match e {
                TurnEvent::ChunkReceived { chunk, .. } => chunk.clone(),
                _ => None,
            })
            .collect();
        let TurnOutcome::Narrated { message, .. } = outcome else {
            panic!("expected Narrated");
        };
        assert_eq!(message.content(), concatenated);
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.messages()[1].content(), "Once upon a time");
        assert!(conversation.in_flight().is_none());
        assert_eq!(h.repo.saved_campaigns().len(), 1);
    }

    #[tokio::test]
    async fn test_buffered_turn_emits_single_message_received() {
        // Arrange
        let h = harness(
            ScriptedNarrationClient::new().with_completion("The forest is quiet."),
            MockRng,
            false,
        );
        let mut campaign = campaign();
        let mut conversation = Conversation::new();
        let (dispatcher, mut receiver) = EventDispatcher::channel();

        // Act
        let outcome = h
            .orchestrator
            .handle_user_prompt(&mut campaign, &mut conversation, "Listen", &dispatcher)
            .await
            .unwrap();

        // Assert
        let events = drain(&mut receiver);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], TurnEvent::MessageReceived { message }
            if message.content() == "The forest is quiet."));
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.messages()[1].role(), Role::Assistant);
        assert!(matches!(
            outcome,
            TurnOutcome::Narrated {
                prompt_type: SystemPromptType::Default,
                player_died: false,
                ..
            }
        ));
        let calls = h.client.calls();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].streamed);
        assert_eq!(calls[0].system_prompt, "template:default");
    }

    #[tokio::test]
    async fn test_blank_prompt_is_skipped_without_side_effects() {
        let h = harness(ScriptedNarrationClient::new(), MockRng, true);
        let mut campaign = campaign();
        let before = campaign.clone();
        let mut conversation = Conversation::new();
        let (dispatcher, mut receiver) = EventDispatcher::channel();

        let outcome = h
            .orchestrator
            .handle_user_prompt(&mut campaign, &mut conversation, "   \n\t", &dispatcher)
            .await
            .unwrap();

        assert_eq!(outcome, TurnOutcome::Skipped);
        assert_eq!(campaign, before);
        assert!(conversation.is_empty());
        assert!(h.client.calls().is_empty());
        assert!(h.repo.saved_campaigns().is_empty());
        assert!(drain(&mut receiver).is_empty());
    }

    #[tokio::test]
    async fn test_stream_failure_propagates_and_discards_partial_message() {
        // Arrange
        let h = harness(
            ScriptedNarrationClient::new().with_failing_stream(&["Once "], "connection reset"),
            MockRng,
            true,
        );
        let mut campaign = campaign();
        let mut conversation = Conversation::new();
        let (dispatcher, mut receiver) = EventDispatcher::channel();

        // Act
        let result = h
            .orchestrator
            .handle_user_prompt(&mut campaign, &mut conversation, "Look around", &dispatcher)
            .await;

        // Assert
        match result.unwrap_err() {
            DomainError::Narration(msg) => assert_eq!(msg, "connection reset"),
            other => panic!("expected Narration, got {other:?}"),
        }
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.messages()[0].role(), Role::User);
        assert!(conversation.in_flight().is_none());
        assert!(h.repo.saved_campaigns().is_empty());
        let events = drain(&mut receiver);
        assert!(!events.contains(&TurnEvent::done()));
    }

    #[tokio::test]
    async fn test_streamed_turn_announces_message_before_model_responds() {
        // Arrange
        let rng: Arc<Mutex<dyn DeterministicRng + Send>> = Arc::new(Mutex::new(MockRng));
        let orchestrator = TurnOrchestrator::new(
            Arc::new(FailingNarrationClient),
            Arc::new(GameStateManager::new(Arc::new(
                RecordingCampaignRepository::new(),
            ))),
            Arc::new(PromptTemplates::from_fn(|t| t.to_string())),
            rng,
            Arc::new(FixedClock::default()),
        );
        let mut campaign = campaign();
        let mut conversation = Conversation::new();
        let (dispatcher, mut receiver) = EventDispatcher::channel();

        // Act
        let result = orchestrator
            .handle_user_prompt(&mut campaign, &mut conversation, "Look around", &dispatcher)
            .await;

        // Assert
        assert!(matches!(result, Err(DomainError::Narration(_))));
        let events = drain(&mut receiver);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], TurnEvent::MessageStarted { message }
            if message.content().is_empty()));
        assert_eq!(conversation.len(), 1);
        assert!(conversation.in_flight().is_none());
    }

    #[tokio::test]
    async fn test_streamed_request_excludes_empty_placeholder() {
        let h = harness(
            ScriptedNarrationClient::new().with_stream(&["Quiet."]),
            MockRng,
            true,
        );
        let mut campaign = campaign();
        let mut conversation = Conversation::new();

        h.orchestrator
            .handle_user_prompt(
                &mut campaign,
                &mut conversation,
                "Listen",
                &EventDispatcher::detached(),
            )
            .await
            .unwrap();

        let calls = h.client.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].streamed);
        assert_eq!(calls[0].messages.len(), 1);
        assert_eq!(calls[0].messages[0].role(), Role::User);
    }

    #[tokio::test]
    async fn test_combat_turn_feeds_mechanics_to_model_then_strips_them() {
        // Arrange
        let h = harness(
            ScriptedNarrationClient::new()
                .with_completion(
                    r#"{"characters": [{"name": "Goblin", "type": "SmallCreature"}], "opponent": "Goblin"}"#,
                )
                .with_completion("Your blade bites deep."),
            SequenceRng::new(vec![15]).with_floats(vec![0.8, 0.2]),
            false,
        );
        let mut campaign = campaign();
        campaign.set_combat_mode(true);
        let mut conversation = Conversation::new();
        let dispatcher = EventDispatcher::detached();

        // Act
        let outcome = h
            .orchestrator
            .handle_user_prompt(&mut campaign, &mut conversation, "I attack", &dispatcher)
            .await
            .unwrap();

        // Assert
        assert!(matches!(
            outcome,
            TurnOutcome::Narrated {
                prompt_type: SystemPromptType::CombatHitMiss,
                ..
            }
        ));
        let calls = h.client.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].system_prompt, "template:combat_hit_miss");
        assert!(
            calls[1]
                .messages
                .iter()
                .any(|m| m.role() == Role::System && m.is_transient())
        );

        assert_eq!(conversation.len(), 2);
        assert!(conversation.iter().all(|m| !m.is_transient()));
        assert_eq!(conversation.strip_transient(), 0);
        assert_eq!(campaign.characters()[0].current_health(), 15);
    }

    #[tokio::test]
    async fn test_player_death_concludes_campaign_and_blocks_further_turns() {
        // Arrange
        let h = harness(
            ScriptedNarrationClient::new()
                .with_completion(r#"{"characters": [{"name": "Wyrm", "type": "Monster"}]}"#)
                .with_completion("Darkness takes you."),
            SequenceRng::new(vec![10, 20]).with_floats(vec![0.9, 0.9]),
            false,
        );
        let player = Character::new_player(Uuid::new_v4(), "Aria", "").with_health(15, 100);
        let mut campaign = Campaign::new(Uuid::new_v4(), player, "A lair.");
        campaign.set_combat_mode(true);
        let mut conversation = Conversation::new();
        let dispatcher = EventDispatcher::detached();

        // Act
        let outcome = h
            .orchestrator
            .handle_user_prompt(&mut campaign, &mut conversation, "I strike", &dispatcher)
            .await
            .unwrap();
        let next = h
            .orchestrator
            .handle_user_prompt(&mut campaign, &mut conversation, "I get up", &dispatcher)
            .await;

        // Assert
        assert!(matches!(
            outcome,
            TurnOutcome::Narrated {
                prompt_type: SystemPromptType::Default,
                player_died: true,
                ..
            }
        ));
        let calls = h.client.calls();
        assert!(
            calls[1]
                .messages
                .last()
                .is_some_and(|m| m.content().starts_with("Aria has died"))
        );
        assert!(campaign.is_concluded());
        assert!(!campaign.combat_mode());
        assert!(h.repo.saved_campaigns()[0].is_concluded());
        assert!(matches!(next, Err(DomainError::Validation(_))));
        assert_eq!(conversation.len(), 2);
    }

    #[tokio::test]
    async fn test_narration_payload_updates_and_persists_world_state() {
        let h = harness(
            ScriptedNarrationClient::new().with_completion(
                r#"{"narrative": "A bandit blocks the road.",
                    "environment": {"name": "Old Road", "description": "Muddy"},
                    "characters": [{"name": "Bandit", "description": "Scarred"}],
                    "isInCombat": true}"#,
            ),
            MockRng,
            false,
        );
        let mut campaign = campaign();
        let mut conversation = Conversation::new();

        h.orchestrator
            .handle_user_prompt(
                &mut campaign,
                &mut conversation,
                "Walk on",
                &EventDispatcher::detached(),
            )
            .await
            .unwrap();

        assert!(campaign.combat_mode());
        assert_eq!(campaign.current_environment().unwrap().name, "Old Road");
        let saved = h.repo.saved_campaigns();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].characters()[0].name, "Bandit");
    }

    #[tokio::test]
    async fn test_persistence_failure_propagates_and_strips_transient_messages() {
        // Arrange
        let rng: Arc<Mutex<dyn DeterministicRng + Send>> = Arc::new(Mutex::new(
            SequenceRng::new(vec![]).with_floats(vec![0.0, 0.0]),
        ));
        let orchestrator = TurnOrchestrator::new(
            Arc::new(
                ScriptedNarrationClient::new()
                    .with_completion(r#"{"characters": [{"name": "Bandit"}]}"#)
                    .with_completion("You both stumble."),
            ),
            Arc::new(GameStateManager::new(Arc::new(FailingCampaignRepository))),
            Arc::new(PromptTemplates::from_fn(|t| t.to_string())),
            rng,
            Arc::new(FixedClock::default()),
        )
        .with_config(TurnConfig { streaming: false });
        let mut campaign = campaign();
        campaign.set_combat_mode(true);
        let mut conversation = Conversation::new();

        // Act
        let result = orchestrator
            .handle_user_prompt(
                &mut campaign,
                &mut conversation,
                "I swing",
                &EventDispatcher::detached(),
            )
            .await;

        // Assert
        match result.unwrap_err() {
            DomainError::Infrastructure(msg) => assert_eq!(msg, "connection refused"),
            other => panic!("expected Infrastructure, got {other:?}"),
        }
        assert!(conversation.iter().all(|m| !m.is_transient()));
    }

    #[test]
    fn test_mock_responses_force_streaming_off() {
        assert!(TurnConfig::resolve(true, false).streaming);
        assert!(!TurnConfig::resolve(true, true).streaming);
        assert!(!TurnConfig::resolve(false, false).streaming);
        assert!(!TurnConfig::resolve(false, true).streaming);
    }
}
