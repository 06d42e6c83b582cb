// src/llm/mock.rs
// Deterministic in-memory LLM/embedding provider. Concrete providers
// (OpenAI, Anthropic, local models) are external collaborators out of
// scope for this core — this implementation exists so the
// rest of the pipeline is independently testable.

use async_trait::async_trait;

use crate::error::MemoriaResult;
use crate::llm::{EmbeddingProvider, LlmProvider, Message, Response, TokenUsage};

/// A no-op provider that echoes a deterministic summary/classification so
/// callers (and tests) can assert on pipeline behavior without a network
/// dependency.
pub struct MockLlmProvider {
    pub dimension: usize,
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self { dimension: 8 }
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn chat(&self, messages: Vec<Message>, system: String) -> MemoriaResult<Response> {
        let joined: String = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let content = format!("[{system}] summary of: {}", truncate(&joined, 120));
        let tokens = TokenUsage {
            input: approx_token_count(&joined),
            output: approx_token_count(&content),
        };
        Ok(Response {
            content,
            model: "mock-1".to_string(),
            tokens,
        })
    }

    async fn count_tokens(&self, text: &str) -> MemoriaResult<i64> {
        Ok(approx_token_count(text))
    }
}

#[async_trait]
impl EmbeddingProvider for MockLlmProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> MemoriaResult<Vec<f32>> {
        // Deterministic pseudo-embedding derived from a byte hash, spread
        // across the configured dimension.
        let mut seed: u32 = 2166136261;
        for b in text.bytes() {
            seed ^= b as u32;
            seed = seed.wrapping_mul(16777619);
        }
        Ok((0..self.dimension)
            .map(|i| {
                let v = seed.wrapping_add(i as u32 * 2654435761);
                (v % 1000) as f32 / 1000.0
            })
            .collect())
    }
}

fn approx_token_count(text: &str) -> i64 {
    // Rough approximation (~4 chars/token), matching the order of
    // magnitude real tokenizers produce without depending on one.
    ((text.len() as f64) / 4.0).ceil() as i64
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}...", &s[..max])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embed_is_deterministic() {
        let p = MockLlmProvider::default();
        let a = p.embed("hello").await.unwrap();
        let b = p.embed("hello").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), p.dimension());
    }

    #[tokio::test]
    async fn chat_produces_nonempty_content() {
        let p = MockLlmProvider::default();
        let resp = p
            .chat(vec![Message::user("hi")], "system".to_string())
            .await
            .unwrap();
        assert!(!resp.content.is_empty());
    }
}
