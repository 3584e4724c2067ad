//! Test narration clients — scripted `NarrationClient` implementations.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use storyloom_core::error::DomainError;
use storyloom_core::message::{Conversation, Message};
use storyloom_core::narration::{FragmentStream, NarrationClient};

/// One request observed by a `ScriptedNarrationClient`.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationCall {
    /// The system prompt sent with the request.
    pub system_prompt: String,
    /// The conversation as it was when the request was issued.
    pub messages: Vec<Message>,
    /// Whether the streamed endpoint was used.
    pub streamed: bool,
}

type Scripted<T> = Mutex<VecDeque<Result<T, String>>>;

/// A narration client that replays queued responses and records every
/// request. Atomic completions and streams are queued separately. When a
/// queue is empty the client returns `DomainError::Narration`.
#[derive(Debug, Default)]
pub struct ScriptedNarrationClient {
    completions: Scripted<String>,
    streams: Mutex<VecDeque<Vec<Result<String, String>>>>,
    calls: Mutex<Vec<NarrationCall>>,
}

impl ScriptedNarrationClient {
    /// Create a client with nothing queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an atomic completion.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_completion(self, text: impl Into<String>) -> Self {
        self.completions
            .lock()
            .unwrap()
            .push_back(Ok(text.into()));
        self
    }

    /// Queue a failing atomic completion.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_completion_error(self, message: impl Into<String>) -> Self {
        self.completions
            .lock()
            .unwrap()
            .push_back(Err(message.into()));
        self
    }

    /// Queue a stream that yields `fragments` and then ends.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_stream(self, fragments: &[&str]) -> Self {
        self.streams
            .lock()
            .unwrap()
            .push_back(fragments.iter().map(|f| Ok((*f).to_owned())).collect());
        self
    }

    /// Queue a stream that yields `fragments` and then fails.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_failing_stream(self, fragments: &[&str], error: impl Into<String>) -> Self {
        let mut items: Vec<Result<String, String>> =
            fragments.iter().map(|f| Ok((*f).to_owned())).collect();
        items.push(Err(error.into()));
        self.streams.lock().unwrap().push_back(items);
        self
    }

    /// Returns every request made so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls(&self) -> Vec<NarrationCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, conversation: &Conversation, system_prompt: &str, streamed: bool) {
        self.calls.lock().unwrap().push(NarrationCall {
            system_prompt: system_prompt.to_owned(),
            messages: conversation.messages().to_vec(),
            streamed,
        });
    }
}

#[async_trait]
impl NarrationClient for ScriptedNarrationClient {
    async fn get_chat_completion(
        &self,
        conversation: &Conversation,
        system_prompt: &str,
    ) -> Result<String, DomainError> {
        self.record(conversation, system_prompt, false);
        self.completions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("no scripted completion left".to_owned()))
            .map_err(DomainError::Narration)
    }

    async fn get_streamed_chat_completion(
        &self,
        conversation: &Conversation,
        system_prompt: &str,
    ) -> Result<FragmentStream, DomainError> {
        self.record(conversation, system_prompt, true);
        let items = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| DomainError::Narration("no scripted stream left".to_owned()))?;
        Ok(stream::iter(
            items
                .into_iter()
                .map(|item| item.map_err(DomainError::Narration)),
        )
        .boxed())
    }
}

/// A narration client whose every request fails. Useful for testing error
/// propagation.
#[derive(Debug)]
pub struct FailingNarrationClient;

#[async_trait]
impl NarrationClient for FailingNarrationClient {
    async fn get_chat_completion(
        &self,
        _conversation: &Conversation,
        _system_prompt: &str,
    ) -> Result<String, DomainError> {
        Err(DomainError::Narration("model unavailable".into()))
    }

    async fn get_streamed_chat_completion(
        &self,
        _conversation: &Conversation,
        _system_prompt: &str,
    ) -> Result<FragmentStream, DomainError> {
        Err(DomainError::Narration("model unavailable".into()))
    }
}
