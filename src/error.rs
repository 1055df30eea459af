//! Block-wide error types.

use thiserror::Error;

use crate::llm::ProviderError;

/// Errors surfaced by the block and its collaborator seams.
///
/// Only `Config` is designed to degrade gracefully (the processor answers
/// with an empty envelope). `Retrieval`, `History` and `Generation` fail the
/// single request; the host platform owns fallback and error reporting.
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("config error: {0}")]
    Config(String),

    #[error("retrieval error: {0}")]
    Retrieval(String),

    #[error("history error: {0}")]
    History(String),

    #[error("generation error: {0}")]
    Generation(#[from] ProviderError),
}
