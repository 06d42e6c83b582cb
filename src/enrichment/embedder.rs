// src/enrichment/embedder.rs
// `message_embedder` handler: batch-embeds message content
// and persists each vector keyed by message UUID.

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

use super::message_refs;

/// Embedding calls are bounded so one slow provider can't stall the
/// whole dispatch loop.
const EMBEDDING_TIMEOUT: Duration = Duration::from_secs(90);

pub struct MessageEmbedderTask {
    store: Arc<dyn MemoryStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl MessageEmbedderTask {
    pub fn new(store: Arc<dyn MemoryStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }
}

#[async_trait]
impl Task for MessageEmbedderTask {
    fn topic(&self) -> Topic {
        Topic::MessageEmbedder
    }

    async fn execute(&self, envelope: &TaskEnvelope) -> MemoriaResult<()> {
        let (session_id, uuids) = message_refs(envelope)?;
        let messages = self.store.get_messages_by_uuid(session_id, uuids).await?;
        if messages.is_empty() {
            debug!(session_id, "messages gone before embedding, acking");
            return Ok(());
        }

        let texts: Vec<String> = messages.iter().map(|m| m.content.clone()).collect();
        let vectors = tokio::time::timeout(EMBEDDING_TIMEOUT, self.embedder.embed_batch(&texts))
            .await
            .map_err(|_| crate::error::MemoriaError::transient("embedding call timed out"))??;

        let embeddings: Vec<TextEmbedding> = messages
            .iter()
            .zip(vectors)
            .map(|(message, vector)| TextEmbedding {
                owner_kind: EmbeddingOwnerKind::Message,
                owner_uuid: message.uuid,
                text_snapshot: message.content.clone(),
                vector,
                model: self.embedder.name().to_string(),
                language: None,
            })
            .collect();

        self.store.create_message_embeddings(embeddings).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockLlmProvider;
    use crate::memory::sqlite::SqliteMemoryStore;
    use crate::memory::traits::MemoryBatch;
    use crate::memory::types::Message;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_store() -> Arc<dyn MemoryStore> {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        Arc::new(SqliteMemoryStore::new(pool).await.unwrap())
    }

    #[tokio::test]
    async fn embeds_and_persists_each_message() {
        let store = test_store().await;
        let saved = store
            .put_memory("s1", MemoryBatch { messages: vec![Message::new("s1", "user", "hi")] }, true)
            .await
            .unwrap();
        let uuid = saved[0].uuid;

        let task = MessageEmbedderTask::new(store.clone(), Arc::new(MockLlmProvider::default()));
        let envelope = TaskEnvelope::for_messages("s1", vec![uuid], None);
        task.execute(&envelope).await.unwrap();

        let embeddings = store.get_message_embeddings(&[uuid]).await.unwrap();
        assert_eq!(embeddings.len(), 1);
        assert_eq!(embeddings[0].owner_uuid, uuid);
    }

    #[tokio::test]
    async fn missing_messages_are_acked() {
        let store = test_store().await;
        let task = MessageEmbedderTask::new(store.clone(), Arc::new(MockLlmProvider::default()));
        let envelope = TaskEnvelope::for_messages("s1", vec![uuid::Uuid::new_v4()], None);
        assert!(task.execute(&envelope).await.is_ok());
    }
}
