//! Retrieval-augmented response block.
//!
//! Given an incoming user utterance, the block retrieves relevant
//! knowledge-base documents and a bounded window of conversation history,
//! assembles a generation request (flattened single prompt or native chat
//! history), invokes the configured text-generation backend and wraps the
//! reply in the platform's outgoing envelope.
//!
//! The host platform owns content search and history storage; both are
//! consumed through the trait seams in [`retrieval`] and [`history`].
//! [`block::RagBlock::process`] is the sole entry point, invoked once per
//! incoming message.

pub mod block;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod logger;
pub mod message;
pub mod prompt;
pub mod retrieval;
