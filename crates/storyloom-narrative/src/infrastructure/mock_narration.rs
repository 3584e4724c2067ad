//! Offline narration.
//!
//! Produces deterministic payload JSON so the engine runs end to end without
//! a model. Attacking or fighting starts a brawl with a goblin.

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use serde_json::json;
use storyloom_core::error::DomainError;
use storyloom_core::message::Conversation;
use storyloom_core::narration::{FragmentStream, NarrationClient};
use tracing::debug;

const COMBAT_WORDS: [&str; 2] = ["attack", "fight"];

/// Narration client returning canned responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockNarrationClient;

impl MockNarrationClient {
    /// Creates the client.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn respond(conversation: &Conversation) -> String {
        let prompt = conversation
            .last_user_message()
            .map(|m| m.content().to_owned())
            .unwrap_or_default();
        let lowered = prompt.to_lowercase();

        if COMBAT_WORDS.iter().any(|w| lowered.contains(w)) {
            json!({
                "narrative": "A snarling goblin leaps from the undergrowth, rusty blade raised.",
                "characters": [{
                    "name": "Goblin",
                    "description": "A wiry green creature with a rusty blade",
                    "type": "SmallCreature",
                }],
                "isInCombat": true,
                "opponent": "Goblin",
            })
            .to_string()
        } else {
            json!({
                "narrative": format!("You {}. The world waits for your next move.", prompt.trim_end_matches('.')),
            })
            .to_string()
        }
    }
}

#[async_trait]
impl NarrationClient for MockNarrationClient {
    async fn get_chat_completion(
        &self,
        conversation: &Conversation,
        system_prompt: &str,
    ) -> Result<String, DomainError> {
        debug!(system_prompt_len = system_prompt.len(), "mock completion");
        Ok(Self::respond(conversation))
    }

    async fn get_streamed_chat_completion(
        &self,
        conversation: &Conversation,
        _system_prompt: &str,
    ) -> Result<FragmentStream, DomainError> {
        let text = Self::respond(conversation);
        let fragments: Vec<Result<String, DomainError>> = text
            .split_inclusive(' ')
            .map(|word| Ok(word.to_owned()))
            .collect();
        Ok(stream::iter(fragments).boxed())
    }
}
