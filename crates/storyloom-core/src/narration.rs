//! Narration client abstraction.
//!
//! The narrating model sits behind this port. Adapters issue either one
//! atomic completion or a lazy stream of text fragments for a conversation
//! plus a system prompt.

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::DomainError;
use crate::message::Conversation;

/// A finite, non-restartable sequence of narration fragments.
pub type FragmentStream = BoxStream<'static, Result<String, DomainError>>;

/// Port to the external narration model.
#[async_trait]
pub trait NarrationClient: Send + Sync {
    /// Requests a complete response in one piece.
    async fn get_chat_completion(
        &self,
        conversation: &Conversation,
        system_prompt: &str,
    ) -> Result<String, DomainError>;

    /// Requests a response delivered incrementally.
    async fn get_streamed_chat_completion(
        &self,
        conversation: &Conversation,
        system_prompt: &str,
    ) -> Result<FragmentStream, DomainError>;
}
