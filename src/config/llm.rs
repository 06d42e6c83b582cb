// src/config/llm.rs
// LLM provider selection and credential configuration. Concrete providers
// are out of scope — this config only records which family is
// selected so the prompt layer can pick the matching template.

use serde::{Deserialize, Serialize};

use super::helpers::env_or;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmFamily {
    OpenAi,
    Anthropic,
}

impl LlmFamily {
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "anthropic" => Self::Anthropic,
            _ => Self::OpenAi,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub service: LlmFamily,
    pub model: String,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            service: LlmFamily::from_str_or_default(&env_or("MEMORIA_LLM_SERVICE", "openai")),
            model: env_or("MEMORIA_LLM_MODEL", "gpt-4o"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomPrompts {
    pub summarizer_openai: Option<String>,
    pub summarizer_anthropic: Option<String>,
}

impl CustomPrompts {
    pub fn from_env() -> Self {
        Self {
            summarizer_openai: std::env::var("MEMORIA_CUSTOM_PROMPT_SUMMARIZER_OPENAI").ok(),
            summarizer_anthropic: std::env::var("MEMORIA_CUSTOM_PROMPT_SUMMARIZER_ANTHROPIC").ok(),
        }
    }
}
