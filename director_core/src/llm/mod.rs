//! The narrow functional interface to the external language model.
//!
//! Everything the director or the fuzzy evaluator knows about the model is
//! this trait: free-text prompt in, free text out. Transport, retries, and
//! model selection live behind it, outside this crate.

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a model call. Callers in this crate catch these at
/// the boundary and degrade to a safe default; they are never propagated
/// to the session.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("model transport failure: {0}")]
    Transport(String),

    #[error("model call timed out")]
    Timeout,

    #[error("model returned an empty response")]
    EmptyResponse,
}

/// An external language model answering free-text prompts.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a prompt, returning the model's raw text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}
