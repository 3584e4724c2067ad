//! Message model shared by the orchestrator, the narration adapters and the
//! HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Instructions or synthesized mechanics fed to the model.
    System,
    /// The player.
    User,
    /// The narrating model.
    Assistant,
}

impl Role {
    /// Wire name of the role, as used by chat-completion APIs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single turn's text together with its author.
///
/// Content only ever grows: the sole mutator is [`Message::append`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: String,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    transient: bool,
}

impl Message {
    /// Creates a message.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
            transient: false,
        }
    }

    /// Creates a player message.
    #[must_use]
    pub fn user(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(Role::User, content, timestamp)
    }

    /// Creates a narrator message.
    #[must_use]
    pub fn assistant(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(Role::Assistant, content, timestamp)
    }

    /// Creates a system message that lives for a single turn only.
    #[must_use]
    pub fn transient_system(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            transient: true,
            ..Self::new(Role::System, content, timestamp)
        }
    }

    /// Returns the author role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the creation time.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Whether the message is stripped once its turn completes.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.transient
    }

    /// Appends a streamed fragment.
    pub fn append(&mut self, fragment: &str) {
        self.content.push_str(fragment);
    }
}

/// Ordered message history for one campaign.
///
/// At most one assistant message is "in flight" (being streamed) at a time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
    #[serde(skip)]
    in_flight: Option<usize>,
}

impl Conversation {
    /// Creates an empty conversation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a completed message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Returns all messages in order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` when there is no history.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Iterates over the messages in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    /// Returns the most recent player message.
    #[must_use]
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }

    /// Returns the assistant message currently being streamed, if any.
    #[must_use]
    pub fn in_flight(&self) -> Option<&Message> {
        self.in_flight.map(|index| &self.messages[index])
    }

    /// Opens a zero-length assistant message to be filled by streaming.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if another assistant message is
    /// already in flight.
    pub fn begin_assistant(&mut self, timestamp: DateTime<Utc>) -> Result<&Message, DomainError> {
        if self.in_flight.is_some() {
            return Err(DomainError::Validation(
                "an assistant message is already being streamed".to_owned(),
            ));
        }
        self.messages.push(Message::assistant(String::new(), timestamp));
        let index = self.messages.len() - 1;
        self.in_flight = Some(index);
        Ok(&self.messages[index])
    }

    /// Appends a fragment to the in-flight assistant message.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if no message is in flight.
    pub fn append_to_in_flight(&mut self, fragment: &str) -> Result<(), DomainError> {
        let index = self.in_flight.ok_or_else(|| {
            DomainError::Validation("no assistant message is being streamed".to_owned())
        })?;
        self.messages[index].append(fragment);
        Ok(())
    }

    /// Closes the in-flight assistant message and returns a copy of it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if no message is in flight.
    pub fn finish_in_flight(&mut self) -> Result<Message, DomainError> {
        let index = self.in_flight.take().ok_or_else(|| {
            DomainError::Validation("no assistant message is being streamed".to_owned())
        })?;
        Ok(self.messages[index].clone())
    }

    /// Removes a partially streamed assistant message.
    pub fn abandon_in_flight(&mut self) -> Option<Message> {
        self.in_flight
            .take()
            .map(|index| self.messages.remove(index))
    }

    /// Removes every transient message and returns how many were dropped.
    ///
    /// Idempotent: a second call removes nothing.
    pub fn strip_transient(&mut self) -> usize {
        let before = self.messages.len();
        let mut kept = Vec::with_capacity(before);
        let mut in_flight = None;
        for (index, message) in self.messages.drain(..).enumerate() {
            if message.transient {
                continue;
            }
            if self.in_flight == Some(index) {
                in_flight = Some(kept.len());
            }
            kept.push(message);
        }
        self.messages = kept;
        self.in_flight = in_flight;
        before - self.messages.len()
    }
}

impl<'a> IntoIterator for &'a Conversation {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
