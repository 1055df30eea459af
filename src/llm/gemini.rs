//! Gemini `generateContent` backend adapter.
//!
//! Exposes the [`TextGenerator`] seam the block processor drives. All wire
//! types are private to this module — callers never see them.
//!
//! The backend client handle is created lazily from the first usable
//! credential and memoized for the process lifetime: later calls reuse it
//! regardless of the credential they pass. That first-credential-wins
//! behaviour is a known multi-tenancy hazard — a process serving several
//! tenants should key the handle by credential instead.

use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};

use crate::config::BlockConfig;
use crate::llm::{GenerationRequest, PromptPayload, ProviderError, SamplingOptions, TextGenerator};

// ── Public adapter ────────────────────────────────────────────────────────────

/// Memoized backend connection: HTTP client plus the credential it was
/// created with. `reqwest::Client` is an `Arc` internally, so the handle is
/// cheap to share.
#[derive(Debug)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
}

/// Adapter owning the lazily-created client handle.
///
/// Lazy creation is double-checked behind `init_lock` so concurrent first
/// calls construct at most one handle and every caller observes the same
/// instance. Independent adapters (e.g. in tests) memoize independently —
/// there is no module-level static.
#[derive(Debug)]
pub struct GeminiAdapter {
    base_url: String,
    timeout_seconds: u64,
    handle: OnceLock<GeminiClient>,
    init_lock: Mutex<()>,
}

impl GeminiAdapter {
    pub fn new(base_url: impl Into<String>, timeout_seconds: u64) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_seconds,
            handle: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &BlockConfig) -> Self {
        Self::new(config.api_base_url.clone(), config.timeout_seconds)
    }

    /// Resolve the memoized client handle, creating it on first use.
    ///
    /// An empty credential (or a client build failure) logs a warning and
    /// returns `None` — never an error. Once a handle exists it is returned
    /// for every subsequent call, whatever credential is supplied.
    pub fn get_or_create_client(&self, credential: &str) -> Option<&GeminiClient> {
        if let Some(client) = self.handle.get() {
            return Some(client);
        }

        let _guard = self
            .init_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Another caller may have won the race while we waited for the lock.
        if let Some(client) = self.handle.get() {
            return Some(client);
        }

        if credential.trim().is_empty() {
            warn!("no credential configured — generation client unavailable");
            return None;
        }

        let http = match Client::builder()
            .timeout(std::time::Duration::from_secs(self.timeout_seconds))
            .build()
        {
            Ok(http) => http,
            Err(e) => {
                warn!(error = %e, "failed to build HTTP client — generation unavailable");
                return None;
            }
        };

        let _ = self.handle.set(GeminiClient {
            http,
            api_key: credential.to_string(),
        });
        self.handle.get()
    }

    async fn dispatch(
        &self,
        client: &GeminiClient,
        request: &GenerationRequest,
    ) -> Result<String, ProviderError> {
        let payload = wire_request(request);
        let url = format!(
            "{}/{}:generateContent?key={}",
            self.base_url, request.model, client.api_key
        );

        debug!(
            model = %request.model,
            contents = payload.contents.len(),
            "sending generation request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full generation request payload");
        }

        let response = client.http.post(&url).json(&payload).send().await.map_err(|e| {
            error!(error = %e, "generation HTTP request failed (transport)");
            ProviderError::Request(e.to_string())
        })?;

        let response = check_status(response).await?;

        let parsed = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| {
                error!(error = %e, "failed to deserialize generation response");
                ProviderError::Response(format!("failed to parse response body: {e}"))
            })?;

        extract_text(parsed)
    }
}

#[async_trait]
impl TextGenerator for GeminiAdapter {
    fn ensure_client(&self, credential: &str) -> bool {
        self.get_or_create_client(credential).is_some()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let client = self
            .handle
            .get()
            .ok_or_else(|| ProviderError::Request("no generation client handle".into()))?;
        self.dispatch(client, request).await
    }
}

/// Pull the first candidate's text out of the parsed response.
fn extract_text(parsed: GenerateContentResponse) -> Result<String, ProviderError> {
    let text = parsed
        .candidates
        .into_iter()
        .next()
        .map(|c| {
            c.content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProviderError::Response("empty or missing candidate text".into()))?;
    Ok(text)
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct WirePart {
    text: String,
}

#[derive(Debug, Serialize)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<WirePart>,
}

impl WireContent {
    fn turn(role: &'static str, text: &str) -> Self {
        Self { role: Some(role), parts: vec![WirePart { text: text.to_string() }] }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    generation_config: &'a SamplingOptions,
}

/// Map a strategy payload onto the wire shape.
///
/// Flat prompts become a single user turn with no system instruction; chat
/// payloads carry the steering text separately plus the ordered history and
/// the latest utterance as the closing user turn.
fn wire_request(request: &GenerationRequest) -> GenerateContentRequest<'_> {
    match &request.payload {
        PromptPayload::Flat { prompt } => GenerateContentRequest {
            contents: vec![WireContent::turn("user", prompt)],
            system_instruction: None,
            generation_config: &request.options,
        },
        PromptPayload::Chat { system_instruction, turns, latest } => {
            let mut contents: Vec<WireContent> = turns
                .iter()
                .map(|t| WireContent::turn(t.role.as_str(), &t.text))
                .collect();
            contents.push(WireContent::turn("user", latest));
            GenerateContentRequest {
                contents,
                system_instruction: Some(WireContent {
                    role: None,
                    parts: vec![WirePart { text: system_instruction.clone() }],
                }),
                generation_config: &request.options,
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

// Error envelope returned by the Gemini API.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Consume the response and return it if successful, or a structured error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    let message = if let Ok(env) = serde_json::from_str::<ErrorEnvelope>(&body) {
        let api_status = env
            .error
            .status
            .map(|s| format!(" [{s}]"))
            .unwrap_or_default();
        format!("HTTP {status}{api_status}: {}", env.error.message)
    } else {
        format!("HTTP {status}: {body}")
    };

    error!(%status, %message, "generation request returned HTTP error");
    Err(ProviderError::Request(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatRole, ChatTurn};

    fn adapter() -> GeminiAdapter {
        GeminiAdapter::new("https://example.invalid/v1beta/models", 5)
    }

    #[test]
    fn empty_credential_yields_no_client() {
        let a = adapter();
        assert!(a.get_or_create_client("").is_none());
        assert!(a.get_or_create_client("   ").is_none());
        // Nothing was memoized by the failed attempts.
        assert!(a.handle.get().is_none());
    }

    #[test]
    fn handle_is_memoized_across_calls() {
        let a = adapter();
        let first = a.get_or_create_client("key-one").unwrap();
        let second = a.get_or_create_client("key-one").unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn first_credential_wins() {
        let a = adapter();
        let first = a.get_or_create_client("key-one").unwrap();
        assert_eq!(first.api_key, "key-one");
        // A different credential afterwards still resolves the original handle.
        let later = a.get_or_create_client("key-two").unwrap();
        assert!(std::ptr::eq(first, later));
        assert_eq!(later.api_key, "key-one");
        // Even an empty credential now resolves the memoized handle.
        assert!(a.get_or_create_client("").is_some());
    }

    #[test]
    fn independent_adapters_memoize_independently() {
        let a = adapter();
        let b = adapter();
        a.get_or_create_client("key-a").unwrap();
        assert!(b.handle.get().is_none());
        assert_eq!(b.get_or_create_client("key-b").unwrap().api_key, "key-b");
    }

    #[tokio::test]
    async fn generate_without_handle_errors() {
        let a = adapter();
        let request = GenerationRequest {
            model: "gemini-1.5-flash".into(),
            payload: PromptPayload::Flat { prompt: "hi".into() },
            options: SamplingOptions::default(),
        };
        let err = a.generate(&request).await.unwrap_err();
        assert!(err.to_string().contains("no generation client handle"));
    }

    #[test]
    fn flat_payload_maps_to_single_user_turn() {
        let request = GenerationRequest {
            model: "m".into(),
            payload: PromptPayload::Flat { prompt: "the whole prompt".into() },
            options: SamplingOptions::default(),
        };
        let v = serde_json::to_value(wire_request(&request)).unwrap();
        assert!(v.get("systemInstruction").is_none());
        assert_eq!(v["contents"].as_array().unwrap().len(), 1);
        assert_eq!(v["contents"][0]["role"], "user");
        assert_eq!(v["contents"][0]["parts"][0]["text"], "the whole prompt");
        assert!(v["generationConfig"].get("maxOutputTokens").is_some());
    }

    #[test]
    fn chat_payload_carries_history_and_system_instruction() {
        let request = GenerationRequest {
            model: "m".into(),
            payload: PromptPayload::Chat {
                system_instruction: "CONTEXT: x".into(),
                turns: vec![
                    ChatTurn { role: ChatRole::User, text: "hi".into() },
                    ChatTurn { role: ChatRole::Model, text: "hello".into() },
                ],
                latest: "how are you?".into(),
            },
            options: SamplingOptions::default(),
        };
        let v = serde_json::to_value(wire_request(&request)).unwrap();
        assert_eq!(v["systemInstruction"]["parts"][0]["text"], "CONTEXT: x");
        let contents = v["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["role"], "user");
        assert_eq!(contents[2]["parts"][0]["text"], "how are you?");
    }

    #[test]
    fn extract_text_joins_parts_and_rejects_empty() {
        let parsed: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hello " }, { "text": "world" }] } }]
        }))
        .unwrap();
        assert_eq!(extract_text(parsed).unwrap(), "Hello world");

        let empty: GenerateContentResponse =
            serde_json::from_value(serde_json::json!({ "candidates": [] })).unwrap();
        assert!(extract_text(empty).is_err());

        let blank: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "  " }] } }]
        }))
        .unwrap();
        assert!(extract_text(blank).is_err());
    }
}
