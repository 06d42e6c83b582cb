// src/llm/mod.rs
// Uniform interface for chat completion, text embedding, and token counting
// across providers. Concrete providers (OpenAI, Anthropic,
// local) are external collaborators — only the interface lives here.

pub mod mock;
pub mod model_limits;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MemoriaResult;

/// A single chat message exchanged with an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TokenUsage {
    pub input: i64,
    pub output: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub content: String,
    pub model: String,
    pub tokens: TokenUsage,
}

/// Universal LLM provider interface. Must be thread-safe and implement its
/// own concurrency limits — the router shares one instance
/// across every handler.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Basic chat completion (no tool calling — out of scope for this core).
    async fn chat(&self, messages: Vec<Message>, system: String) -> MemoriaResult<Response>;

    /// Count tokens for a rendered string under this provider's tokenizer.
    async fn count_tokens(&self, text: &str) -> MemoriaResult<i64>;
}

/// Uniform text-embedding interface.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fixed dimension produced by this provider's configured model.
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> MemoriaResult<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> MemoriaResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts {
            out.push(self.embed(t).await?);
        }
        Ok(out)
    }
}
