// src/enrichment/summary_embedder.rs
// `message_summary_embedder` handler: same shape as
// `message_embedder`, keyed by summary UUID instead of a batch of message
// UUIDs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::MemoriaResult;
use crate::llm::EmbeddingProvider;
use crate::memory::types::{EmbeddingOwnerKind, TaskEnvelope, TextEmbedding};
use crate::memory::MemoryStore;
use crate::queue::Topic;
use crate::router::Task;

use super::summary_ref;

const EMBEDDING_TIMEOUT: Duration = Duration::from_secs(90);

pub struct SummaryEmbedderTask {
    store: Arc<dyn MemoryStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SummaryEmbedderTask {
    pub fn new(store: Arc<dyn MemoryStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }
}

#[async_trait]
impl Task for SummaryEmbedderTask {
    fn topic(&self) -> Topic {
        Topic::MessageSummaryEmbedder
    }

    async fn execute(&self, envelope: &TaskEnvelope) -> MemoriaResult<()> {
        let (_session_id, uuid) = summary_ref(envelope)?;
        let summary = match self.store.get_summary_by_uuid(uuid).await {
            Ok(summary) => summary,
            Err(e) if e.is_not_found() => {
                debug!(%uuid, "summary gone before embedding, acking");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let vector = tokio::time::timeout(EMBEDDING_TIMEOUT, self.embedder.embed(&summary.text))
            .await
            .map_err(|_| crate::error::MemoriaError::transient("embedding call timed out"))??;

        self.store
            .put_summary_embedding(TextEmbedding {
                owner_kind: EmbeddingOwnerKind::Summary,
                owner_uuid: summary.uuid,
                text_snapshot: summary.text,
                vector,
                model: self.embedder.name().to_string(),
                language: None,
            })
            .await
    }
}
