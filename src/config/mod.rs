// src/config/mod.rs
// Central configuration — composes domain sub-configs the way a production
// service does: one `from_env()` per concern, one lazily-built global.

pub mod helpers;
pub mod llm;
pub mod memory;
pub mod router;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::error::{MemoriaError, MemoriaResult};
use crate::summarizer::prompts::validate_prompt_template;

lazy_static! {
    pub static ref CONFIG: MemoriaConfig = MemoriaConfig::from_env();
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoriaConfig {
    pub memory: memory::MemoryConfig,
    pub extractors: memory::ExtractorsConfig,
    pub nlp: memory::NlpConfig,
    pub llm: llm::LlmConfig,
    pub custom_prompts: llm::CustomPrompts,
    pub queue: router::QueueConfig,
    pub router: router::RouterConfig,
    pub auth_secret: String,
}

impl MemoriaConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            memory: memory::MemoryConfig::from_env(),
            extractors: memory::ExtractorsConfig::from_env(),
            nlp: memory::NlpConfig::from_env(),
            llm: llm::LlmConfig::from_env(),
            custom_prompts: llm::CustomPrompts::from_env(),
            queue: router::QueueConfig::from_env(),
            router: router::RouterConfig::from_env(),
            auth_secret: std::env::var("MEMORIA_AUTH_SECRET").unwrap_or_default(),
        }
    }

    /// Fatal configuration checks performed at startup: empty auth secret,
    /// invalid prompt template.
    pub fn validate(&self) -> MemoriaResult<()> {
        if self.auth_secret.trim().is_empty() {
            return Err(MemoriaError::fatal("MEMORIA_AUTH_SECRET must not be empty"));
        }

        if self.memory.message_window == 0 {
            return Err(MemoriaError::fatal(
                "MEMORIA_MESSAGE_WINDOW must be greater than zero",
            ));
        }

        if let Some(p) = &self.custom_prompts.summarizer_openai {
            validate_prompt_template(p)
                .map_err(|e| MemoriaError::fatal(format!("custom OpenAI summarizer prompt: {e}")))?;
        }
        if let Some(p) = &self.custom_prompts.summarizer_anthropic {
            validate_prompt_template(p).map_err(|e| {
                MemoriaError::fatal(format!("custom Anthropic summarizer prompt: {e}"))
            })?;
        }

        Ok(())
    }
}
