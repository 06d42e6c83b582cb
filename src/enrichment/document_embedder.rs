// src/enrichment/document_embedder.rs
// `document_embedder` handler: a separate pipeline
// keyed by `collection_name`. Unlike the message/summary handlers, the
// envelope payload already carries `{uuid, content}` pairs — there is no
// UUID-only re-read step, since document collections live outside the
// session-scoped MemoryStore contract: document-collection CRUD lives
// outside this core; only write-back of the embedding result is in
// scope here, via `DocumentStore`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::MemoriaResult;
use crate::llm::EmbeddingProvider;
use crate::memory::types::TaskEnvelope;
use crate::memory::DocumentStore;
use crate::queue::Topic;
use crate::router::Task;

use super::document_refs;

const EMBEDDING_TIMEOUT: Duration = Duration::from_secs(90);

pub struct DocumentEmbedderTask {
    store: Arc<dyn DocumentStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    dimensions: usize,
}

impl DocumentEmbedderTask {
    pub fn new(store: Arc<dyn DocumentStore>, embedder: Arc<dyn EmbeddingProvider>, dimensions: usize) -> Self {
        Self { store, embedder, dimensions }
    }
}

#[async_trait]
impl Task for DocumentEmbedderTask {
    fn topic(&self) -> Topic {
        Topic::DocumentEmbedder
    }

    async fn execute(&self, envelope: &TaskEnvelope) -> MemoriaResult<()> {
        let (collection_name, items) = document_refs(envelope)?;
        if items.is_empty() {
            debug!(collection_name, "documents gone before embedding, acking");
            return Ok(());
        }

        let texts: Vec<String> = items.iter().map(|d| d.content.clone()).collect();
        let vectors = tokio::time::timeout(EMBEDDING_TIMEOUT, self.embedder.embed_batch(&texts))
            .await
            .map_err(|_| crate::error::MemoriaError::transient("embedding call timed out"))??;

        let pairs: Vec<(uuid::Uuid, Vec<f32>)> = items
            .iter()
            .zip(vectors)
            .map(|(doc, vector)| (doc.uuid, vector))
            .collect();

        // If any documents disappeared between publish and now, the store
        // skips them silently rather than erroring.
        self.store
            .write_document_embeddings(collection_name, self.dimensions, pairs)
            .await
    }
}
