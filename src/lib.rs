// src/lib.rs
// Core of a long-term conversational memory service: ingest, durable task
// routing, and incremental summarization. Transport, auth,
// concrete LLM/embedding providers, and concrete persistence engines are
// external collaborators abstracted behind the traits in `llm` and
// `memory` — only their interfaces live in this crate.

pub mod api;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod memory;
pub mod publisher;
pub mod queue;
pub mod router;
pub mod summarizer;

pub use config::{MemoriaConfig, CONFIG};
pub use error::{MemoriaError, MemoriaResult};
