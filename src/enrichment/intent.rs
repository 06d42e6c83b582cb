// src/enrichment/intent.rs
// `message_intent` handler: classifies each message's intent
// via one LLM chat call per message, runs a bounded number of these calls
// concurrently. Bounded concurrency grounded directly on Design Notes §9's
// "small parallel map with bounded concurrency" requirement, implemented
// with `futures::stream::iter(...).buffer_unordered(n)` — `futures` is
// already a teacher dependency and this is its idiomatic shape.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use regex::Regex;
use serde_json::json;
use tracing::debug;

use crate::error::MemoriaResult;
use crate::llm::{LlmProvider, Message as LlmMessage};
use crate::memory::traits::MessageUpdate;
use crate::memory::types::{Message, TaskEnvelope};
use crate::memory::MemoryStore;
use crate::queue::Topic;
use crate::router::Task;

use super::message_refs;

const INTENT_SYSTEM_PROMPT: &str =
    "Classify the intent of the following message in a few words. Respond with only the intent.";

/// Bound on concurrent per-message LLM calls within one batch.
const MAX_CONCURRENT_CLASSIFICATIONS: usize = 5;

static INTENT_PREFIX: OnceLock<Regex> = OnceLock::new();

/// Strips a leading `Intent:` prefix, case-insensitive.
fn strip_intent_prefix(text: &str) -> String {
    let re = INTENT_PREFIX.get_or_init(|| Regex::new(r"(?i)^\s*intent:\s*").unwrap());
    re.replace(text, "").trim().to_string()
}

pub struct IntentTask {
    store: Arc<dyn MemoryStore>,
    llm: Arc<dyn LlmProvider>,
}

impl IntentTask {
    pub fn new(store: Arc<dyn MemoryStore>, llm: Arc<dyn LlmProvider>) -> Self {
        Self { store, llm }
    }

    async fn classify(&self, message: &Message) -> MemoriaResult<Option<MessageUpdate>> {
        let response = self
            .llm
            .chat(vec![LlmMessage::user(&message.content)], INTENT_SYSTEM_PROMPT.to_string())
            .await?;
        let intent = strip_intent_prefix(&response.content);
        if intent.is_empty() {
            return Ok(None);
        }
        Ok(Some(MessageUpdate::metadata_only(
            message.uuid,
            json!({"system": {"intent": intent}}),
        )))
    }
}

#[async_trait]
impl Task for IntentTask {
    fn topic(&self) -> Topic {
        Topic::MessageIntent
    }

    async fn execute(&self, envelope: &TaskEnvelope) -> MemoriaResult<()> {
        let (session_id, uuids) = message_refs(envelope)?;
        let messages = self.store.get_messages_by_uuid(session_id, uuids).await?;
        if messages.is_empty() {
            debug!(session_id, "messages gone before intent classification, acking");
            return Ok(());
        }

        // Per-message calls run concurrently, bounded; every error is
        // collected and a single non-recoverable error fails the batch.
        let results: Vec<MemoriaResult<Option<MessageUpdate>>> = stream::iter(messages.iter())
            .map(|message| self.classify(message))
            .buffer_unordered(MAX_CONCURRENT_CLASSIFICATIONS)
            .collect()
            .await;

        let mut updates = Vec::new();
        for result in results {
            match result {
                Ok(Some(update)) => updates.push(update),
                Ok(None) => {}
                Err(e) => return Err(e),
            }
        }
        if updates.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.store.update_messages(session_id, updates, true, false).await {
            if e.is_not_found() {
                return Ok(());
            }
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockLlmProvider;
    use crate::memory::sqlite::SqliteMemoryStore;
    use crate::memory::traits::MemoryBatch;
    use sqlx::sqlite::SqlitePoolOptions;
    use uuid::Uuid;

    async fn test_store() -> Arc<dyn MemoryStore> {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        Arc::new(SqliteMemoryStore::new(pool).await.unwrap())
    }

    #[test]
    fn strips_intent_prefix_case_insensitively() {
        assert_eq!(strip_intent_prefix("Intent: booking a flight"), "booking a flight");
        assert_eq!(strip_intent_prefix("INTENT:   question"), "question");
        assert_eq!(strip_intent_prefix("no prefix here"), "no prefix here");
    }

    #[tokio::test]
    async fn classifies_and_merges_intent_metadata() {
        let store = test_store().await;
        let saved = store
            .put_memory("s1", MemoryBatch { messages: vec![Message::new("s1", "user", "book me a flight")] }, true)
            .await
            .unwrap();
        let uuid = saved[0].uuid;

        let task = IntentTask::new(store.clone(), Arc::new(MockLlmProvider::default()));
        let envelope = TaskEnvelope::for_messages("s1", vec![uuid], None);
        task.execute(&envelope).await.unwrap();

        let updated = store.get_messages_by_uuid("s1", &[uuid]).await.unwrap();
        assert!(updated[0].metadata.get("system").and_then(|s| s.get("intent")).is_some());
    }

    #[tokio::test]
    async fn missing_messages_are_acked() {
        let store = test_store().await;
        let task = IntentTask::new(store.clone(), Arc::new(MockLlmProvider::default()));
        let envelope = TaskEnvelope::for_messages("s1", vec![Uuid::new_v4()], None);
        assert!(task.execute(&envelope).await.is_ok());
    }
}
