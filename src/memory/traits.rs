// src/memory/traits.rs
// The MemoryStore contract. All storage goes through this —
// no direct DB calls from business logic above this layer. Grounded on the
// teacher's `MemoryStore` trait (backend/src/memory/core/traits.rs), scaled
// up from its 5 methods to the full session/message/summary/embedding surface.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::MemoriaResult;

use super::types::{Message, Session, Summary, TextEmbedding};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    CreatedAt,
    UpdatedAt,
    UserId,
    SessionId,
}

/// Cursor-based pagination for unbounded lists.
#[derive(Debug, Clone, Copy)]
pub struct CursorPage {
    pub cursor: i64,
    pub limit: i64,
}

/// Page-based pagination for ordered lists with total counts.
#[derive(Debug, Clone)]
pub struct OrderedPage {
    pub page_number: u32,
    pub page_size: u32,
    pub order_by: OrderBy,
    pub ascending: bool,
}

#[derive(Debug, Clone)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// What `GetMemory` returns: the latest summary plus the relevant messages.
#[derive(Debug, Clone)]
pub struct Memory {
    pub summary: Option<Summary>,
    pub messages: Vec<Message>,
}

/// A semantic search hit: the entity plus its distance, ascending.
#[derive(Debug, Clone)]
pub enum SearchHit {
    Message(Message, f32),
    Summary(Summary, f32),
}

/// A batch of messages to append via `PutMemory`.
#[derive(Debug, Clone, Default)]
pub struct MemoryBatch {
    pub messages: Vec<Message>,
}

#[async_trait]
pub trait MemoryStore: Send + Sync {
    // --- Session CRUD ---
    async fn create_session(&self, session: &Session) -> MemoriaResult<Session>;
    async fn get_session(&self, session_id: &str) -> MemoriaResult<Session>;
    async fn update_session(
        &self,
        session_id: &str,
        metadata_update: Value,
        is_privileged: bool,
    ) -> MemoriaResult<Session>;
    /// Soft delete. Idempotent.
    async fn delete_session(&self, session_id: &str) -> MemoriaResult<()>;
    async fn list_sessions(&self, page: CursorPage) -> MemoriaResult<Vec<Session>>;
    async fn list_sessions_ordered(&self, page: OrderedPage) -> MemoriaResult<PagedResult<Session>>;

    // --- Ingest / read ---
    /// Atomically appends messages, creating the session if absent. Unless
    /// `skip_notify`, the caller (ingest coordinator) is responsible for
    /// scheduling enrichment afterwards — this method only persists.
    async fn put_memory(
        &self,
        session_id: &str,
        batch: MemoryBatch,
        skip_notify: bool,
    ) -> MemoriaResult<Vec<Message>>;

    /// `last_n == 0` returns all messages newer than the current summary's
    /// summary-point (possibly empty), or all messages if there is no
    /// summary yet — see DESIGN.md's Open Question resolution on this case.
    async fn get_memory(&self, session_id: &str, last_n: usize) -> MemoriaResult<Memory>;

    async fn get_messages_by_uuid(&self, session_id: &str, uuids: &[Uuid]) -> MemoriaResult<Vec<Message>>;
    async fn get_message_list(&self, session_id: &str, page: CursorPage) -> MemoriaResult<Vec<Message>>;

    /// Merges metadata by path (see `memory::metadata`); if
    /// `include_content` is false only metadata/token-count change.
    /// Without privilege, top-level `system` keys are dropped first.
    async fn update_messages(
        &self,
        session_id: &str,
        updates: Vec<MessageUpdate>,
        is_privileged: bool,
        include_content: bool,
    ) -> MemoriaResult<Vec<Message>>;

    // --- Summaries ---
    async fn create_summary(&self, session_id: &str, summary: &Summary) -> MemoriaResult<Summary>;
    async fn get_summary(&self, session_id: &str) -> MemoriaResult<Option<Summary>>;
    async fn get_summary_by_uuid(&self, uuid: Uuid) -> MemoriaResult<Summary>;
    async fn get_summary_list(&self, session_id: &str, page: CursorPage) -> MemoriaResult<Vec<Summary>>;
    async fn update_summary(&self, uuid: Uuid, metadata_update: Value) -> MemoriaResult<Summary>;

    // --- Embeddings ---
    async fn create_message_embeddings(&self, embeddings: Vec<TextEmbedding>) -> MemoriaResult<()>;
    async fn get_message_embeddings(&self, uuids: &[Uuid]) -> MemoriaResult<Vec<TextEmbedding>>;
    async fn put_summary_embedding(&self, embedding: TextEmbedding) -> MemoriaResult<()>;

    // --- Search ---
    async fn search_memory(&self, session_id: &str, query_embedding: &[f32], limit: usize) -> MemoriaResult<Vec<SearchHit>>;
    async fn search_sessions(&self, query_embedding: &[f32], limit: usize) -> MemoriaResult<Vec<(Session, f32)>>;

    // --- Maintenance ---
    async fn purge_deleted(&self) -> MemoriaResult<u64>;
}

/// Narrow contract for the document-embedding pipeline (full
/// document-collection CRUD is out of scope; this is only what
/// `document_embedder` needs to write enrichment results back).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Writes a vector plus `is_embedded = true` for each document uuid in
    /// `collection_name`'s table. Uuids that no longer exist are skipped,
    /// not an error: if the documents disappeared, ack and return.
    async fn write_document_embeddings(
        &self,
        collection_name: &str,
        dimensions: usize,
        items: Vec<(Uuid, Vec<f32>)>,
    ) -> MemoriaResult<()>;
}

/// A single message's update payload for `update_messages`.
#[derive(Debug, Clone)]
pub struct MessageUpdate {
    pub uuid: Uuid,
    pub metadata: Value,
    pub content: Option<String>,
    pub token_count: Option<i64>,
}

impl MessageUpdate {
    pub fn metadata_only(uuid: Uuid, metadata: Value) -> Self {
        Self {
            uuid,
            metadata,
            content: None,
            token_count: None,
        }
    }
}
