// src/enrichment/token_counter.rs
// `message_token_count` handler: fills in `token_count` for
// messages that have never been counted.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::error::MemoriaResult;
use crate::llm::LlmProvider;
use crate::memory::traits::MessageUpdate;
use crate::memory::types::TaskEnvelope;
use crate::memory::MemoryStore;
use crate::queue::Topic;
use crate::router::Task;

use super::message_refs;

pub struct TokenCounterTask {
    store: Arc<dyn MemoryStore>,
    llm: Arc<dyn LlmProvider>,
}

impl TokenCounterTask {
    pub fn new(store: Arc<dyn MemoryStore>, llm: Arc<dyn LlmProvider>) -> Self {
        Self { store, llm }
    }
}

#[async_trait]
impl Task for TokenCounterTask {
    fn topic(&self) -> Topic {
        Topic::MessageTokenCount
    }

    async fn execute(&self, envelope: &TaskEnvelope) -> MemoriaResult<()> {
        let (session_id, uuids) = message_refs(envelope)?;
        let messages = self.store.get_messages_by_uuid(session_id, uuids).await?;
        if messages.is_empty() {
            debug!(session_id, "messages gone before token counting, acking");
            return Ok(());
        }

        let mut updates = Vec::new();
        for message in &messages {
            if message.token_count != 0 {
                continue;
            }
            let count = self.llm.count_tokens(&message.as_prompt_line()).await?;
            updates.push(MessageUpdate {
                uuid: message.uuid,
                metadata: json!({}),
                content: None,
                token_count: Some(count),
            });
        }
        if updates.is_empty() {
            return Ok(());
        }
        self.store.update_messages(session_id, updates, true, false).await?;
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
    async fn counts_only_uncounted_messages() {
        let store = test_store().await;
        let saved = store
            .put_memory(
                "s1",
                MemoryBatch { messages: vec![Message::new("s1", "user", "hello there")] },
                true,
            )
            .await
            .unwrap();
        let uuid = saved[0].uuid;

        let task = TokenCounterTask::new(store.clone(), Arc::new(MockLlmProvider::default()));
        let envelope = TaskEnvelope::for_messages("s1", vec![uuid], None);
        task.execute(&envelope).await.unwrap();

        let updated = store.get_messages_by_uuid("s1", &[uuid]).await.unwrap();
        assert!(updated[0].token_count > 0);
    }

    #[tokio::test]
    async fn missing_messages_are_acked() {
        let store = test_store().await;
        let task = TokenCounterTask::new(store.clone(), Arc::new(MockLlmProvider::default()));
        let envelope = TaskEnvelope::for_messages("s1", vec![uuid::Uuid::new_v4()], None);
        assert!(task.execute(&envelope).await.is_ok());
    }
}
