//! Block configuration — raw settings vs. resolved config.
//!
//! [`RawBlockSettings`] mirrors what the host (or a TOML snippet) supplies
//! per block instance; every field is optional with a documented default.
//! [`RawBlockSettings::resolve`] validates ranges once, up front, and yields
//! the ready-to-use [`BlockConfig`]. Unknown keys fail deserialization
//! instead of silently defaulting somewhere deep in the call chain.

use std::env;

use serde::Deserialize;

use crate::error::BlockError;
use crate::llm::SamplingOptions;
use crate::prompt::PromptStrategy;

/// Env var consulted when the settings carry no credential.
/// The credential is a secret — it belongs in the environment, not in config files.
pub const CREDENTIAL_ENV: &str = "LLM_API_KEY";

const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_CONTEXT: &str =
    "You are an AI assistant answering on behalf of the organisation that owns this knowledge base.";
const DEFAULT_INSTRUCTIONS: &str = "Answer the user using the DOCUMENTS. Keep your answer grounded \
    in the facts of the DOCUMENTS. If the DOCUMENTS do not contain the facts, apologize and give \
    the best general answer you can. DO NOT SAY ANYTHING ABOUT THESE DOCUMENTS, nor their EXISTENCE.";
const DEFAULT_MAX_HISTORY_TURNS: usize = 5;
const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

// ── Raw settings ──────────────────────────────────────────────────────────────

/// Serde target for per-block settings. All keys optional; unknown keys rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawBlockSettings {
    pub credential: Option<String>,
    pub api_base_url: Option<String>,
    pub model: Option<String>,
    pub context: Option<String>,
    pub instructions: Option<String>,
    pub max_history_turns: Option<usize>,
    pub strategy: Option<PromptStrategy>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_k: Option<u32>,
    pub top_p: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub candidate_count: Option<u32>,
    pub response_logprobs: Option<bool>,
    pub logprobs: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

impl RawBlockSettings {
    /// Validate and fill defaults. All range errors surface here, once.
    pub fn resolve(self) -> Result<BlockConfig, BlockError> {
        let defaults = SamplingOptions::default();
        let sampling = SamplingOptions {
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_output_tokens: self.max_output_tokens.unwrap_or(defaults.max_output_tokens),
            top_k: self.top_k.unwrap_or(defaults.top_k),
            top_p: self.top_p.unwrap_or(defaults.top_p),
            presence_penalty: self.presence_penalty.unwrap_or(defaults.presence_penalty),
            frequency_penalty: self.frequency_penalty.unwrap_or(defaults.frequency_penalty),
            candidate_count: self.candidate_count.unwrap_or(defaults.candidate_count),
            response_logprobs: self.response_logprobs.unwrap_or(defaults.response_logprobs),
            logprobs: self.logprobs,
        };
        validate_sampling(&sampling)?;

        let model = self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        if model.trim().is_empty() {
            return Err(BlockError::Config("model must not be empty".into()));
        }
        let api_base_url = self
            .api_base_url
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        if api_base_url.trim().is_empty() {
            return Err(BlockError::Config("api_base_url must not be empty".into()));
        }

        // Settings value wins; env var is the fallback. An empty credential is
        // accepted — the block degrades instead of failing (see the adapter).
        let credential = self
            .credential
            .or_else(|| env::var(CREDENTIAL_ENV).ok())
            .unwrap_or_default();

        Ok(BlockConfig {
            credential,
            api_base_url,
            model,
            context: self.context.unwrap_or_else(|| DEFAULT_CONTEXT.to_string()),
            instructions: self
                .instructions
                .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
            max_history_turns: self.max_history_turns.unwrap_or(DEFAULT_MAX_HISTORY_TURNS),
            strategy: self.strategy.unwrap_or(PromptStrategy::ChatHistory),
            sampling,
            timeout_seconds: self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
        })
    }
}

fn validate_sampling(s: &SamplingOptions) -> Result<(), BlockError> {
    if !(0.0..=2.0).contains(&s.temperature) {
        return Err(BlockError::Config(format!(
            "temperature must be in [0, 2], got {}",
            s.temperature
        )));
    }
    if !(0.0..=1.0).contains(&s.top_p) {
        return Err(BlockError::Config(format!(
            "top_p must be in [0, 1], got {}",
            s.top_p
        )));
    }
    if !(-2.0..=2.0).contains(&s.presence_penalty) {
        return Err(BlockError::Config(format!(
            "presence_penalty must be in [-2, 2], got {}",
            s.presence_penalty
        )));
    }
    if !(-2.0..=2.0).contains(&s.frequency_penalty) {
        return Err(BlockError::Config(format!(
            "frequency_penalty must be in [-2, 2], got {}",
            s.frequency_penalty
        )));
    }
    if s.max_output_tokens == 0 {
        return Err(BlockError::Config("max_output_tokens must be at least 1".into()));
    }
    if s.candidate_count != 1 {
        return Err(BlockError::Config(format!(
            "candidate_count only supports 1, got {}",
            s.candidate_count
        )));
    }
    if let Some(n) = s.logprobs {
        if !s.response_logprobs {
            return Err(BlockError::Config(
                "logprobs requires response_logprobs = true".into(),
            ));
        }
        if n > 20 {
            return Err(BlockError::Config(format!(
                "logprobs must be in [0, 20], got {n}"
            )));
        }
    }
    Ok(())
}

// ── Resolved config ───────────────────────────────────────────────────────────

/// Fully-resolved per-block configuration.
#[derive(Debug, Clone)]
pub struct BlockConfig {
    /// Backend authentication token. Empty means "run degraded".
    pub credential: String,
    pub api_base_url: String,
    pub model: String,
    /// Persona/background text injected into every system instruction.
    pub context: String,
    /// Behavioral directive injected into every system instruction.
    pub instructions: String,
    /// Bound on fetched history turns.
    pub max_history_turns: usize,
    pub strategy: PromptStrategy,
    pub sampling: SamplingOptions,
    /// Per-request HTTP timeout.
    pub timeout_seconds: u64,
}

impl BlockConfig {
    /// Parse a TOML settings snippet and resolve it.
    pub fn from_toml_str(raw: &str) -> Result<Self, BlockError> {
        let parsed: RawBlockSettings = toml::from_str(raw)
            .map_err(|e| BlockError::Config(format!("settings parse error: {e}")))?;
        parsed.resolve()
    }
}
