//! Request-scoped message types and the outgoing envelope.
//!
//! [`OutgoingEnvelope`] is the platform-standard wrapper for a reply; its
//! serialised shape is `{"format":"text","message":{"text":...}}`.

use serde::Serialize;

/// Per-request conversation context handed to the block by the host.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    /// Stable identifier of the end user this message belongs to.
    pub user_id: String,
    /// The latest user utterance. May be empty (e.g. attachment-only messages).
    pub text: String,
}

impl ConversationContext {
    pub fn new(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), text: text.into() }
    }
}

/// Format discriminant of an outgoing envelope. Only text replies exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutgoingFormat {
    Text,
}

/// Payload of a text envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextMessage {
    pub text: String,
}

/// Platform-standard outgoing message wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEnvelope {
    pub format: OutgoingFormat,
    pub message: TextMessage,
}

impl OutgoingEnvelope {
    /// Wrap raw generated text into a text envelope. Infallible.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            format: OutgoingFormat::Text,
            message: TextMessage { text: text.into() },
        }
    }
}
