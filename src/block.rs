//! Block processor — the single entry point invoked once per incoming message.
//!
//! Composes retrieval, history, prompt assembly and generation into one
//! end-to-end call chain. The two reads are independent and issued
//! concurrently; everything after them is sequential. There is no queueing,
//! batching or retry at this layer — each message is one independent chain
//! and the only shared resource is the adapter's memoized client handle.

use tracing::{debug, warn};

use crate::config::BlockConfig;
use crate::error::BlockError;
use crate::history::HistoryProvider;
use crate::llm::{GenerationRequest, TextGenerator};
use crate::message::{ConversationContext, OutgoingEnvelope};
use crate::retrieval::ContentSearch;

/// RAG response block: search + history + generation behind one `process` call.
///
/// Generic over the three collaborator seams so hosts wire in their own
/// engines and tests substitute stubs.
pub struct RagBlock<S, H, G> {
    config: BlockConfig,
    search: S,
    history: H,
    generator: G,
}

impl<S, H, G> RagBlock<S, H, G>
where
    S: ContentSearch,
    H: HistoryProvider,
    G: TextGenerator,
{
    pub fn new(config: BlockConfig, search: S, history: H, generator: G) -> Self {
        Self { config, search, history, generator }
    }

    pub fn config(&self) -> &BlockConfig {
        &self.config
    }

    /// Handle one incoming message and produce the outgoing envelope.
    ///
    /// An empty utterance short-circuits to an empty reply without touching
    /// retrieval or generation. An unavailable generation client degrades the
    /// same way. Retrieval, history and generation failures fail the request.
    pub async fn process(
        &self,
        ctx: &ConversationContext,
    ) -> Result<OutgoingEnvelope, BlockError> {
        if ctx.text.is_empty() {
            debug!(user = %ctx.user_id, "empty utterance — skipping retrieval and generation");
            return Ok(OutgoingEnvelope::text(""));
        }

        let (documents, history) = tokio::try_join!(
            self.search.search(&ctx.text),
            self.history.fetch(&ctx.user_id, self.config.max_history_turns),
        )?;
        debug!(
            user = %ctx.user_id,
            documents = documents.len(),
            history_turns = history.len(),
            "assembling generation request"
        );

        let payload = self.config.strategy.assemble(
            &self.config.context,
            &self.config.instructions,
            &documents,
            &history,
            &ctx.text,
        );

        if !self.generator.ensure_client(&self.config.credential) {
            warn!(user = %ctx.user_id, "generation client unavailable — returning empty reply");
            return Ok(OutgoingEnvelope::text(""));
        }

        let request = GenerationRequest {
            model: self.config.model.clone(),
            payload,
            options: self.config.sampling.clone(),
        };
        let text = self.generator.generate(&request).await?;

        Ok(OutgoingEnvelope::text(text))
    }
}
