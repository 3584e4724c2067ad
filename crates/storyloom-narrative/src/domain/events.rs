//! Turn lifecycle events delivered to observers.

use serde::Serialize;
use storyloom_core::message::Message;

/// Progress of a turn, in emission order.
///
/// A buffered turn emits exactly one `MessageReceived`. A streamed turn emits
/// one `MessageStarted` carrying the empty assistant message, then one
/// `ChunkReceived` per non-empty fragment, then exactly one `ChunkReceived`
/// with `is_done` set and no chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// A streamed assistant message has been opened.
    MessageStarted {
        /// The zero-length assistant message.
        message: Message,
    },
    /// A complete assistant message arrived in one piece.
    MessageReceived {
        /// The assistant message.
        message: Message,
    },
    /// A streamed fragment arrived, or streaming finished.
    ChunkReceived {
        /// `true` only on the terminal notification.
        is_done: bool,
        /// The fragment; `None` on the terminal notification.
        chunk: Option<String>,
    },
}

impl TurnEvent {
    /// A fragment notification.
    #[must_use]
    pub fn chunk(fragment: impl Into<String>) -> Self {
        Self::ChunkReceived {
            is_done: false,
            chunk: Some(fragment.into()),
        }
    }

    /// The terminal streaming notification.
    #[must_use]
    pub fn done() -> Self {
        Self::ChunkReceived {
            is_done: true,
            chunk: None,
        }
    }
}
