// src/api/mod.rs
// Session/Message API: the read-side and session-lifecycle
// surface the rest of the core exposes once transport/auth are
// stripped away. A thin wrapper over
// `MemoryStore` plus the embedding provider needed to turn a search query
// into a vector — same "thin struct holding a store handle, one method per
// operation" shape as `backend/src/operations/tasks/store.rs`'s `TaskStore`.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::error::{MemoriaError, MemoriaResult};
use crate::ingest::{IncomingMessage, IngestCoordinator};
use crate::llm::EmbeddingProvider;
use crate::memory::traits::{CursorPage, Memory, OrderBy, OrderedPage, PagedResult, SearchHit};
use crate::memory::types::{Message, Session};
use crate::memory::MemoryStore;

/// The synchronous API surface this core exposes once HTTP, auth, and
/// JSON wire decoding are out of the picture. Callers at the transport
/// layer map these results onto status codes.
pub struct SessionApi {
    store: Arc<dyn MemoryStore>,
    ingest: Arc<IngestCoordinator>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SessionApi {
    pub fn new(store: Arc<dyn MemoryStore>, ingest: Arc<IngestCoordinator>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, ingest, embedder }
    }

    /// `Ingest(session-id, {messages, metadata})`. Returns the
    /// persisted message UUIDs, in the order given.
    pub async fn ingest(
        &self,
        session_id: &str,
        messages: Vec<IncomingMessage>,
        privileged: bool,
        correlation_id: Option<Uuid>,
    ) -> MemoriaResult<Vec<Uuid>> {
        self.ingest.ingest(session_id, messages, privileged, correlation_id).await
    }

    /// `GetMemory(session-id, lastN?)`. `NotFound` when the
    /// session has no messages at all — distinct from "session exists but
    /// the summary covers everything", which returns an empty message list
    /// (Open Question #1, resolved in DESIGN.md).
    pub async fn get_memory(&self, session_id: &str, last_n: usize) -> MemoriaResult<Memory> {
        let memory = self.store.get_memory(session_id, last_n).await?;
        if memory.summary.is_none() && memory.messages.is_empty() {
            return Err(MemoriaError::not_found(format!("no messages for session {session_id}")));
        }
        Ok(memory)
    }

    pub async fn get_messages_by_uuid(&self, session_id: &str, uuids: &[Uuid]) -> MemoriaResult<Vec<Message>> {
        self.store.get_messages_by_uuid(session_id, uuids).await
    }

    pub async fn get_message_list(&self, session_id: &str, page: CursorPage) -> MemoriaResult<Vec<Message>> {
        self.store.get_message_list(session_id, page).await
    }

    pub async fn create_session(&self, session_id: &str, user_id: Option<String>) -> MemoriaResult<Session> {
        self.store.create_session(&Session::new(session_id, user_id)).await
    }

    pub async fn get_session(&self, session_id: &str) -> MemoriaResult<Session> {
        self.store.get_session(session_id).await
    }

    pub async fn update_session(&self, session_id: &str, metadata: Value, privileged: bool) -> MemoriaResult<Session> {
        self.store.update_session(session_id, metadata, privileged).await
    }

    /// `DeleteSession` is idempotent: a second call against an
    /// already-deleted session still returns success. Only a session that
    /// never existed surfaces `NotFound`.
    pub async fn delete_session(&self, session_id: &str) -> MemoriaResult<()> {
        self.store.delete_session(session_id).await
    }

    pub async fn list_sessions(&self, page: CursorPage) -> MemoriaResult<Vec<Session>> {
        self.store.list_sessions(page).await
    }

    pub async fn list_sessions_ordered(
        &self,
        page_number: u32,
        page_size: u32,
        order_by: OrderBy,
        ascending: bool,
    ) -> MemoriaResult<PagedResult<Session>> {
        self.store
            .list_sessions_ordered(OrderedPage { page_number, page_size, order_by, ascending })
            .await
    }

    /// Embeds `query` with the configured provider and delegates to
    /// `MemoryStore::search_memory`.
    pub async fn search_memory(&self, session_id: &str, query: &str, limit: usize) -> MemoriaResult<Vec<SearchHit>> {
        let vector = self.embedder.embed(query).await?;
        self.store.search_memory(session_id, &vector, limit).await
    }

    pub async fn search_sessions(&self, query: &str, limit: usize) -> MemoriaResult<Vec<(Session, f32)>> {
        let vector = self.embedder.embed(query).await?;
        self.store.search_sessions(&vector, limit).await
    }
}
