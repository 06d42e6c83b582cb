// src/config/memory.rs
// Memory/ingest configuration: sliding-window size, extractor enable flags,
// and per-plan content-length caps.

use serde::{Deserialize, Serialize};

use super::helpers::{env_bool, env_or, env_parsed};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Sliding-window size driving summarization.
    /// A value of 0 is a fatal misconfiguration, checked at first use.
    pub message_window: usize,

    /// Default `lastN` an out-of-scope transport layer should substitute
    /// when a caller omits `lastN` entirely in the external `GetMemory`
    /// request. Passing an explicit `0` through to
    /// `MemoryStore::get_memory` is a distinct, meaningful request (see
    /// DESIGN.md's resolution of the `lastN == 0` Open Question) and is
    /// never substituted with this value.
    pub default_last_n: usize,

    /// Max messages accepted in a single `Ingest` call.
    pub max_messages_per_ingest: usize,
    /// Max content length for a standard-plan message.
    pub max_content_len_standard: usize,
    /// Max content length for an elevated-plan message.
    pub max_content_len_elevated: usize,
}

impl MemoryConfig {
    pub fn from_env() -> Self {
        Self {
            message_window: env_parsed("MEMORIA_MESSAGE_WINDOW", 10),
            default_last_n: env_parsed("MEMORIA_DEFAULT_LAST_N", 6),
            max_messages_per_ingest: env_parsed("MEMORIA_MAX_MESSAGES_PER_INGEST", 30),
            max_content_len_standard: env_parsed("MEMORIA_MAX_CONTENT_LEN_STANDARD", 2_500),
            max_content_len_elevated: env_parsed("MEMORIA_MAX_CONTENT_LEN_ELEVATED", 100_000),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorsConfig {
    pub summarizer_enabled: bool,
    pub summarizer_embeddings_enabled: bool,
    pub summarizer_entities_enabled: bool,
    pub embeddings_enabled: bool,
    pub entities_enabled: bool,
    pub intent_enabled: bool,
    pub documents_embeddings_enabled: bool,
    pub documents_embeddings_max_procs: usize,
    pub documents_embeddings_chunk_size: usize,
    pub documents_embeddings_buffer_size: usize,
    pub documents_embeddings_dimensions: usize,
}

impl ExtractorsConfig {
    pub fn from_env() -> Self {
        Self {
            summarizer_enabled: env_bool("MEMORIA_EXTRACTORS_SUMMARIZER_ENABLED", true),
            summarizer_embeddings_enabled: env_bool(
                "MEMORIA_EXTRACTORS_SUMMARIZER_EMBEDDINGS_ENABLED",
                true,
            ),
            summarizer_entities_enabled: env_bool(
                "MEMORIA_EXTRACTORS_SUMMARIZER_ENTITIES_ENABLED",
                true,
            ),
            embeddings_enabled: env_bool("MEMORIA_EXTRACTORS_EMBEDDINGS_ENABLED", true),
            entities_enabled: env_bool("MEMORIA_EXTRACTORS_ENTITIES_ENABLED", false),
            intent_enabled: env_bool("MEMORIA_EXTRACTORS_INTENT_ENABLED", false),
            documents_embeddings_enabled: env_bool(
                "MEMORIA_EXTRACTORS_DOCUMENTS_EMBEDDINGS_ENABLED",
                false,
            ),
            documents_embeddings_max_procs: env_parsed(
                "MEMORIA_EXTRACTORS_DOCUMENTS_EMBEDDINGS_MAX_PROCS",
                4,
            ),
            documents_embeddings_chunk_size: env_parsed(
                "MEMORIA_EXTRACTORS_DOCUMENTS_EMBEDDINGS_CHUNK_SIZE",
                1_000,
            ),
            documents_embeddings_buffer_size: env_parsed(
                "MEMORIA_EXTRACTORS_DOCUMENTS_EMBEDDINGS_BUFFER_SIZE",
                16,
            ),
            documents_embeddings_dimensions: env_parsed(
                "MEMORIA_EXTRACTORS_DOCUMENTS_EMBEDDINGS_DIMENSIONS",
                768,
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NlpConfig {
    pub server_url: String,
}

impl NlpConfig {
    pub fn from_env() -> Self {
        Self {
            server_url: env_or("MEMORIA_NLP_SERVER_URL", "http://localhost:8088"),
        }
    }
}
