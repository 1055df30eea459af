//! Text-generation backend abstraction.
//!
//! [`TextGenerator`] is the seam the block processor drives; `gemini.rs`
//! holds the concrete adapter. Wire types stay private to the provider
//! module — callers only ever see [`GenerationRequest`] and plain text out.

pub mod gemini;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("malformed provider response: {0}")]
    Response(String),
}

// ── Sampling options ──────────────────────────────────────────────────────────

/// Pass-through sampling parameters, serialised camelCase for the backend's
/// `generationConfig`. Ranges are enforced at config resolution, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_k: u32,
    pub top_p: f32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    /// The backend only accepts 1.
    pub candidate_count: u32,
    pub response_logprobs: bool,
    /// Only meaningful when `response_logprobs` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<u32>,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            max_output_tokens: 256,
            top_k: 40,
            top_p: 0.95,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            candidate_count: 1,
            response_logprobs: false,
            logprobs: None,
        }
    }
}

// ── Request types ─────────────────────────────────────────────────────────────

/// Role of a chat turn as the backend understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

/// One already-rendered turn of native chat history.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

/// Strategy-shaped prompt material, produced by the assembler.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptPayload {
    /// Everything flattened into a single prompt blob.
    Flat { prompt: String },
    /// Native multi-turn chat: steering text + ordered history + the
    /// current utterance as the closing user turn.
    Chat {
        system_instruction: String,
        turns: Vec<ChatTurn>,
        latest: String,
    },
}

/// One generation call, consumed exactly once.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub payload: PromptPayload,
    pub options: SamplingOptions,
}

// ── Generator seam ────────────────────────────────────────────────────────────

/// Backend adapter driven by the block processor.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Resolve (or lazily create) the backend client handle.
    ///
    /// Returns `false` when no handle exists and `credential` cannot produce
    /// one — the caller is expected to degrade, not crash. Must never panic.
    fn ensure_client(&self, credential: &str) -> bool;

    /// One blocking generation round-trip. No retry, no backoff; failures
    /// propagate to the caller.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError>;
}
