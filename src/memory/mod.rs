//! Memory module (C2): durable persistence of sessions, messages,
//! summaries, and embeddings, plus the typed metadata-merge helper used by
//! the ingest and enrichment paths.

pub mod metadata;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use metadata::MetadataPath;
pub use traits::{DocumentStore, MemoryStore};
pub use types::{Message, Session, Summary, TaskEnvelope, TextEmbedding};
