//! Conversation history window — the seam to the host's message store.
//!
//! History turns carry either plain text or structured payloads (quick
//! replies, carousels, …). Structured payloads are modelled explicitly as a
//! sum type and rendered to text when a prompt needs them, never dropped.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BlockError;

/// Who authored a history turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

/// Payload of a single turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnPayload {
    Text(String),
    Structured(Value),
}

impl TurnPayload {
    /// Plain-text rendering of the payload.
    ///
    /// Structured payloads are serialised to compact JSON so they still
    /// contribute to the conversational context.
    pub fn render(&self) -> String {
        match self {
            TurnPayload::Text(s) => s.clone(),
            TurnPayload::Structured(v) => serde_json::to_string(v).unwrap_or_default(),
        }
    }
}

/// One past exchanged message.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryTurn {
    pub role: TurnRole,
    pub payload: TurnPayload,
}

impl HistoryTurn {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self { role: TurnRole::User, payload: TurnPayload::Text(text.into()) }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self { role: TurnRole::Assistant, payload: TurnPayload::Text(text.into()) }
    }

    pub fn structured(role: TurnRole, value: Value) -> Self {
        Self { role, payload: TurnPayload::Structured(value) }
    }
}

/// Bounded, ordered read of a user's prior turns.
///
/// Contract: returns the `max_turns` most recent turns, oldest first, even
/// when more history exists. Side-effect-free; failures propagate as
/// [`BlockError::History`] and fail the request.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    async fn fetch(&self, user_id: &str, max_turns: usize) -> Result<Vec<HistoryTurn>, BlockError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_payload_renders_verbatim() {
        let t = HistoryTurn::user_text("hello there");
        assert_eq!(t.payload.render(), "hello there");
    }

    #[test]
    fn structured_payload_renders_as_json() {
        let t = HistoryTurn::structured(
            TurnRole::Assistant,
            serde_json::json!({ "quick_replies": ["yes", "no"] }),
        );
        let rendered = t.payload.render();
        assert!(rendered.contains("quick_replies"));
        assert!(rendered.contains("yes"));
    }
}
