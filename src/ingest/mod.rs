// src/ingest/mod.rs
// Ingest Coordinator: validate, lock, persist, fan out.
// Per-session in-process lock registry grounded on
// `backend/src/state.rs`'s `RwLock<HashMap<String, ...>>` pattern (there:
// `upload_sessions`), generalized to one `tokio::sync::Mutex<()>` per
// session rather than per-upload.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::warn;
use uuid::Uuid;

use crate::config::memory::MemoryConfig;
use crate::error::{MemoriaError, MemoriaResult};
use crate::memory::metadata::strip_system;
use crate::memory::traits::MemoryBatch;
use crate::memory::types::Message;
use crate::memory::MemoryStore;
use crate::publisher::TaskPublisher;

/// One message as handed to `Ingest` before it becomes a persisted
/// [`Message`] — role/content/metadata only, no UUID or timestamp yet.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub role: String,
    pub content: String,
    pub metadata: serde_json::Value,
}

pub struct IngestCoordinator {
    store: Arc<dyn MemoryStore>,
    publisher: Arc<TaskPublisher>,
    config: MemoryConfig,
    session_locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl IngestCoordinator {
    pub fn new(store: Arc<dyn MemoryStore>, publisher: Arc<TaskPublisher>, config: MemoryConfig) -> Self {
        Self {
            store,
            publisher,
            config,
            session_locks: RwLock::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.session_locks.read().await.get(session_id) {
            return lock.clone();
        }
        let mut locks = self.session_locks.write().await;
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn validate(&self, messages: &[IncomingMessage], privileged: bool) -> MemoriaResult<()> {
        if messages.is_empty() {
            return Err(MemoriaError::bad_request("at least one message is required"));
        }
        if messages.len() > self.config.max_messages_per_ingest {
            return Err(MemoriaError::bad_request(format!(
                "max messages per memory of {} exceeded",
                self.config.max_messages_per_ingest
            )));
        }
        let content_cap = if privileged {
            self.config.max_content_len_elevated
        } else {
            self.config.max_content_len_standard
        };
        for m in messages {
            if m.role.trim().is_empty() {
                return Err(MemoriaError::bad_request("message role must not be empty"));
            }
            if m.content.len() > content_cap {
                return Err(MemoriaError::bad_request(format!(
                    "message content exceeds max length of {content_cap}"
                )));
            }
        }
        Ok(())
    }

    /// `Ingest(sessionID, messages, privileged)`. Returns
    /// the persisted messages' UUIDs in insertion order.
    pub async fn ingest(
        &self,
        session_id: &str,
        messages: Vec<IncomingMessage>,
        privileged: bool,
        correlation_id: Option<Uuid>,
    ) -> MemoriaResult<Vec<Uuid>> {
        self.validate(&messages, privileged)?;

        let lock = self.lock_for(session_id).await;
        let _guard = lock.lock().await;

        let batch = MemoryBatch {
            messages: messages
                .into_iter()
                .map(|m| {
                    let metadata = if privileged { m.metadata } else { strip_system(&m.metadata) };
                    let mut message = Message::new(session_id, m.role, m.content);
                    message.metadata = metadata;
                    message
                })
                .collect(),
        };

        // PutMemory persists only; this coordinator owns the publish step
        // explicitly, so skip_notify is always true.
        let persisted = self.store.put_memory(session_id, batch, true).await?;
        let uuids: Vec<Uuid> = persisted.iter().map(|m| m.uuid).collect();

        // A publish failure does not roll back the insert — ingest is
        // durable; enrichment is retried by the router.
        if let Err(e) = self
            .publisher
            .publish_message(session_id, uuids.clone(), correlation_id)
            .await
        {
            warn!(session_id, error = %e, "enrichment publish failed after durable ingest");
        }

        Ok(uuids)
    }
}
