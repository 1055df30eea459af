//! Retrieval gateway — the seam to the host's knowledge-base search.
//!
//! The concrete search engine lives in the host platform; the block only
//! needs ranked documents for a query. Implementations must preserve result
//! order — it carries ranking information all the way into the prompt.

use async_trait::async_trait;

use crate::error::BlockError;

/// One retrieved knowledge-base entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub title: String,
    pub content: String,
}

impl Document {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self { title: title.into(), content: content.into() }
    }
}

/// Ranked full-text search over the knowledge base.
///
/// Contract: an empty query or a query with no matches yields an empty vec,
/// not an error. No retries — underlying failures propagate as
/// [`BlockError::Retrieval`] and fail the request.
#[async_trait]
pub trait ContentSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<Document>, BlockError>;
}
