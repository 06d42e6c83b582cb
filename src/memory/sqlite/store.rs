// src/memory/sqlite/store.rs
// Concrete MemoryStore (C2) over SQLite. Plain `sqlx::query(...).bind(...)`
// calls and manual row mapping, matching the idiom of
// `backend/src/memory/storage/sqlite/{core,store}.rs` — no `query!`
// macro (that needs a live DB at compile time; this crate has none) and no
// migrations directory, just `CREATE TABLE IF NOT EXISTS` on pool setup.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{MemoriaError, MemoriaResult};
use crate::memory::metadata;
use crate::memory::traits::{
    CursorPage, DocumentStore, Memory, MemoryBatch, MemoryStore, MessageUpdate, OrderBy,
    OrderedPage, PagedResult, SearchHit,
};
use crate::memory::types::{EmbeddingOwnerKind, Message, Session, Summary, TextEmbedding};

use super::advisory_lock;
use super::schema;

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const PURGE_GRACE_DAYS: i64 = 30;

/// SQLite-backed [`MemoryStore`]. Owns a dedicated pool — kept separate from
/// the queue's pool: the store runs read-committed while the queue needs
/// repeatable-read; mixing them on one pool risks the driver applying the
/// wrong isolation to the wrong statement.
pub struct SqliteMemoryStore {
    pool: SqlitePool,
}

impl SqliteMemoryStore {
    /// Opens the store, auto-initializing schema on the given pool.
    pub async fn new(pool: SqlitePool) -> MemoriaResult<Self> {
        schema::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn decode_metadata(raw: &str) -> MemoriaResult<Value> {
    Ok(serde_json::from_str(raw).unwrap_or_else(|_| Value::Object(Default::default())))
}

fn millis_to_dt(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}

fn session_from_row(row: &sqlx::sqlite::SqliteRow) -> MemoriaResult<Session> {
    let uuid_str: String = row.try_get("uuid")?;
    let metadata_raw: String = row.try_get("metadata")?;
    Ok(Session {
        session_id: row.try_get("session_id")?,
        uuid: Uuid::parse_str(&uuid_str).map_err(|e| MemoriaError::internal(e.to_string()))?,
        created_at: millis_to_dt(row.try_get("created_at")?),
        updated_at: millis_to_dt(row.try_get("updated_at")?),
        deleted_at: row
            .try_get::<Option<i64>, _>("deleted_at")?
            .map(millis_to_dt),
        user_id: row.try_get("user_id")?,
        metadata: decode_metadata(&metadata_raw)?,
    })
}

fn message_from_row(row: &sqlx::sqlite::SqliteRow) -> MemoriaResult<Message> {
    let uuid_str: String = row.try_get("uuid")?;
    let metadata_raw: String = row.try_get("metadata")?;
    Ok(Message {
        uuid: Uuid::parse_str(&uuid_str).map_err(|e| MemoriaError::internal(e.to_string()))?,
        session_id: row.try_get("session_id")?,
        created_at: millis_to_dt(row.try_get("created_at")?),
        role: row.try_get("role")?,
        content: row.try_get("content")?,
        metadata: decode_metadata(&metadata_raw)?,
        token_count: row.try_get("token_count")?,
    })
}

fn summary_from_row(row: &sqlx::sqlite::SqliteRow) -> MemoriaResult<Summary> {
    let uuid_str: String = row.try_get("uuid")?;
    let summary_point_str: String = row.try_get("summary_point")?;
    let metadata_raw: String = row.try_get("metadata")?;
    Ok(Summary {
        uuid: Uuid::parse_str(&uuid_str).map_err(|e| MemoriaError::internal(e.to_string()))?,
        session_id: row.try_get("session_id")?,
        created_at: millis_to_dt(row.try_get("created_at")?),
        text: row.try_get("text")?,
        summary_point: Uuid::parse_str(&summary_point_str)
            .map_err(|e| MemoriaError::internal(e.to_string()))?,
        token_count: row.try_get("token_count")?,
        metadata: decode_metadata(&metadata_raw)?,
    })
}

fn embedding_from_row(
    row: &sqlx::sqlite::SqliteRow,
    owner_kind: EmbeddingOwnerKind,
) -> MemoriaResult<TextEmbedding> {
    let owner_uuid: String = row.try_get("owner_uuid")?;
    let vector_raw: String = row.try_get("vector")?;
    Ok(TextEmbedding {
        owner_kind,
        owner_uuid: Uuid::parse_str(&owner_uuid).map_err(|e| MemoriaError::internal(e.to_string()))?,
        text_snapshot: row.try_get("text_snapshot")?,
        vector: serde_json::from_str(&vector_raw)?,
        model: row.try_get("model")?,
        language: row.try_get("language")?,
    })
}

fn order_by_column(order_by: OrderBy) -> &'static str {
    match order_by {
        OrderBy::CreatedAt => "created_at",
        OrderBy::UpdatedAt => "updated_at",
        OrderBy::UserId => "user_id",
        OrderBy::SessionId => "session_id",
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

#[async_trait]
impl MemoryStore for SqliteMemoryStore {
    async fn create_session(&self, session: &Session) -> MemoriaResult<Session> {
        let result = sqlx::query(
            r#"
            INSERT INTO sessions (session_id, uuid, created_at, updated_at, deleted_at, user_id, metadata)
            VALUES (?, ?, ?, ?, NULL, ?, ?)
            "#,
        )
        .bind(&session.session_id)
        .bind(session.uuid.to_string())
        .bind(session.created_at.timestamp_millis())
        .bind(session.updated_at.timestamp_millis())
        .bind(&session.user_id)
        .bind(serde_json::to_string(&session.metadata)?)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(session.clone()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                MemoriaError::conflict(format!("session {} already exists", session.session_id)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_session(&self, session_id: &str) -> MemoriaResult<Session> {
        let row = sqlx::query("SELECT * FROM sessions WHERE session_id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| MemoriaError::not_found(format!("session {session_id}")))?;

        let session = session_from_row(&row)?;
        if session.is_deleted() {
            return Err(MemoriaError::not_found(format!("session {session_id}")));
        }
        Ok(session)
    }

    async fn update_session(
        &self,
        session_id: &str,
        metadata_update: Value,
        is_privileged: bool,
    ) -> MemoriaResult<Session> {
        let lock_key = advisory_lock::session_lock_key(session_id);
        let _guard =
            advisory_lock::acquire(&self.pool, &lock_key, "update_session", LOCK_TIMEOUT).await?;

        let mut session = self.get_session(session_id).await?;

        let incoming = if is_privileged {
            metadata_update
        } else {
            metadata::strip_system(&metadata_update)
        };
        session.metadata = metadata::merge(&session.metadata, &incoming);
        session.updated_at = Utc::now();

        sqlx::query("UPDATE sessions SET metadata = ?, updated_at = ? WHERE session_id = ?")
            .bind(serde_json::to_string(&session.metadata)?)
            .bind(session.updated_at.timestamp_millis())
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(session)
    }

    async fn delete_session(&self, session_id: &str) -> MemoriaResult<()> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM sessions WHERE session_id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(MemoriaError::not_found(format!("session {session_id}")));
        }

        sqlx::query(
            "UPDATE sessions SET deleted_at = COALESCE(deleted_at, ?) WHERE session_id = ?",
        )
        .bind(Utc::now().timestamp_millis())
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_sessions(&self, page: CursorPage) -> MemoriaResult<Vec<Session>> {
        let rows = sqlx::query(
            "SELECT *, rowid FROM sessions WHERE deleted_at IS NULL AND rowid > ? ORDER BY rowid LIMIT ?",
        )
        .bind(page.cursor)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(session_from_row).collect()
    }

    async fn list_sessions_ordered(&self, page: OrderedPage) -> MemoriaResult<PagedResult<Session>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?;

        let column = order_by_column(page.order_by);
        let direction = if page.ascending { "ASC" } else { "DESC" };
        let offset = (page.page_number.saturating_sub(1) as i64) * page.page_size as i64;

        let sql = format!(
            "SELECT * FROM sessions WHERE deleted_at IS NULL ORDER BY {column} {direction} LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query(&sql)
            .bind(page.page_size as i64)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let items = rows.iter().map(session_from_row).collect::<MemoriaResult<Vec<_>>>()?;
        Ok(PagedResult {
            items,
            total: total.max(0) as u64,
        })
    }

    async fn put_memory(
        &self,
        session_id: &str,
        batch: MemoryBatch,
        _skip_notify: bool,
    ) -> MemoriaResult<Vec<Message>> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let existing_deleted: Option<Option<i64>> =
            sqlx::query_scalar("SELECT deleted_at FROM sessions WHERE session_id = ?")
                .bind(session_id)
                .fetch_optional(&mut *tx)
                .await?;

        match existing_deleted {
            Some(Some(_)) => {
                return Err(MemoriaError::conflict(format!(
                    "session {session_id} is deleted"
                )))
            }
            Some(None) => {}
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO sessions (session_id, uuid, created_at, updated_at, deleted_at, user_id, metadata)
                    VALUES (?, ?, ?, ?, NULL, NULL, '{}')
                    "#,
                )
                .bind(session_id)
                .bind(Uuid::new_v4().to_string())
                .bind(now.timestamp_millis())
                .bind(now.timestamp_millis())
                .execute(&mut *tx)
                .await?;
            }
        }

        let mut seq: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(seq), 0) FROM messages WHERE session_id = ?")
            .bind(session_id)
            .fetch_one(&mut *tx)
            .await?;

        let mut saved = Vec::with_capacity(batch.messages.len());
        for mut msg in batch.messages {
            seq += 1;
            msg.session_id = session_id.to_string();
            sqlx::query(
                r#"
                INSERT INTO messages (uuid, session_id, created_at, seq, role, content, metadata, token_count)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(msg.uuid.to_string())
            .bind(session_id)
            .bind(msg.created_at.timestamp_millis())
            .bind(seq)
            .bind(&msg.role)
            .bind(&msg.content)
            .bind(serde_json::to_string(&msg.metadata)?)
            .bind(msg.token_count)
            .execute(&mut *tx)
            .await?;
            saved.push(msg);
        }

        sqlx::query("UPDATE sessions SET updated_at = ? WHERE session_id = ?")
            .bind(now.timestamp_millis())
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(session_id, count = saved.len(), "persisted message batch");
        Ok(saved)
    }

    async fn get_memory(&self, session_id: &str, last_n: usize) -> MemoriaResult<Memory> {
        let summary = self.get_summary(session_id).await?;

        if last_n > 0 {
            let rows = sqlx::query(
                "SELECT * FROM messages WHERE session_id = ? ORDER BY created_at DESC, seq DESC LIMIT ?",
            )
            .bind(session_id)
            .bind(last_n as i64)
            .fetch_all(&self.pool)
            .await?;
            let mut messages = rows.iter().map(message_from_row).collect::<MemoriaResult<Vec<_>>>()?;
            messages.reverse();
            return Ok(Memory { summary, messages });
        }

        // With last_n == 0: messages strictly newer than the current
        // summary's point (possibly empty); all messages when there is no
        // summary yet (see DESIGN.md's Open Question resolution).
        let messages = match &summary {
            Some(s) => {
                let point_row = sqlx::query("SELECT created_at, seq FROM messages WHERE uuid = ?")
                    .bind(s.summary_point.to_string())
                    .fetch_optional(&self.pool)
                    .await?;
                match point_row {
                    Some(point) => {
                        let point_created_at: i64 = point.try_get("created_at")?;
                        let point_seq: i64 = point.try_get("seq")?;
                        let rows = sqlx::query(
                            r#"
                            SELECT * FROM messages
                            WHERE session_id = ?
                              AND (created_at > ? OR (created_at = ? AND seq > ?))
                            ORDER BY created_at ASC, seq ASC
                            "#,
                        )
                        .bind(session_id)
                        .bind(point_created_at)
                        .bind(point_created_at)
                        .bind(point_seq)
                        .fetch_all(&self.pool)
                        .await?;
                        rows.iter().map(message_from_row).collect::<MemoriaResult<Vec<_>>>()?
                    }
                    // The summary's point message was purged; treat as empty
                    // rather than guessing — caller re-summarizes from scratch.
                    None => Vec::new(),
                }
            }
            None => {
                let rows = sqlx::query("SELECT * FROM messages WHERE session_id = ? ORDER BY created_at ASC, seq ASC")
                    .bind(session_id)
                    .fetch_all(&self.pool)
                    .await?;
                rows.iter().map(message_from_row).collect::<MemoriaResult<Vec<_>>>()?
            }
        };

        Ok(Memory { summary, messages })
    }

    async fn get_messages_by_uuid(&self, session_id: &str, uuids: &[Uuid]) -> MemoriaResult<Vec<Message>> {
        if uuids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; uuids.len()].join(", ");
        let sql = format!(
            "SELECT * FROM messages WHERE session_id = ? AND uuid IN ({placeholders}) ORDER BY created_at ASC, seq ASC"
        );
        let mut query = sqlx::query(&sql).bind(session_id);
        for uuid in uuids {
            query = query.bind(uuid.to_string());
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(message_from_row).collect()
    }

    async fn get_message_list(&self, session_id: &str, page: CursorPage) -> MemoriaResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT *, rowid FROM messages WHERE session_id = ? AND rowid > ? ORDER BY rowid LIMIT ?",
        )
        .bind(session_id)
        .bind(page.cursor)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(message_from_row).collect()
    }

    async fn update_messages(
        &self,
        session_id: &str,
        updates: Vec<MessageUpdate>,
        is_privileged: bool,
        include_content: bool,
    ) -> MemoriaResult<Vec<Message>> {
        let mut out = Vec::with_capacity(updates.len());
        for update in updates {
            let row = sqlx::query("SELECT * FROM messages WHERE session_id = ? AND uuid = ?")
                .bind(session_id)
                .bind(update.uuid.to_string())
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| MemoriaError::not_found(format!("message {}", update.uuid)))?;
            let mut message = message_from_row(&row)?;

            let incoming = if is_privileged {
                update.metadata
            } else {
                metadata::strip_system(&update.metadata)
            };
            message.metadata = metadata::merge(&message.metadata, &incoming);

            if include_content {
                if let Some(content) = update.content {
                    message.content = content;
                }
            }
            if let Some(token_count) = update.token_count {
                message.token_count = token_count;
            }

            sqlx::query("UPDATE messages SET content = ?, metadata = ?, token_count = ? WHERE uuid = ?")
                .bind(&message.content)
                .bind(serde_json::to_string(&message.metadata)?)
                .bind(message.token_count)
                .bind(message.uuid.to_string())
                .execute(&self.pool)
                .await?;

            out.push(message);
        }
        Ok(out)
    }

    async fn create_summary(&self, session_id: &str, summary: &Summary) -> MemoriaResult<Summary> {
        sqlx::query(
            r#"
            INSERT INTO summaries (uuid, session_id, created_at, text, summary_point, token_count, metadata)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(summary.uuid.to_string())
        .bind(session_id)
        .bind(summary.created_at.timestamp_millis())
        .bind(&summary.text)
        .bind(summary.summary_point.to_string())
        .bind(summary.token_count)
        .bind(serde_json::to_string(&summary.metadata)?)
        .execute(&self.pool)
        .await?;
        Ok(summary.clone())
    }

    async fn get_summary(&self, session_id: &str) -> MemoriaResult<Option<Summary>> {
        let row = sqlx::query(
            "SELECT * FROM summaries WHERE session_id = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(summary_from_row).transpose()
    }

    async fn get_summary_by_uuid(&self, uuid: Uuid) -> MemoriaResult<Summary> {
        let row = sqlx::query("SELECT * FROM summaries WHERE uuid = ?")
            .bind(uuid.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| MemoriaError::not_found(format!("summary {uuid}")))?;
        summary_from_row(&row)
    }

    async fn get_summary_list(&self, session_id: &str, page: CursorPage) -> MemoriaResult<Vec<Summary>> {
        let rows = sqlx::query(
            "SELECT *, rowid FROM summaries WHERE session_id = ? AND rowid > ? ORDER BY rowid LIMIT ?",
        )
        .bind(session_id)
        .bind(page.cursor)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(summary_from_row).collect()
    }

    async fn update_summary(&self, uuid: Uuid, metadata_update: Value) -> MemoriaResult<Summary> {
        let mut summary = self.get_summary_by_uuid(uuid).await?;
        summary.metadata = metadata::merge(&summary.metadata, &metadata_update);
        sqlx::query("UPDATE summaries SET metadata = ? WHERE uuid = ?")
            .bind(serde_json::to_string(&summary.metadata)?)
            .bind(uuid.to_string())
            .execute(&self.pool)
            .await?;
        Ok(summary)
    }

    async fn create_message_embeddings(&self, embeddings: Vec<TextEmbedding>) -> MemoriaResult<()> {
        for embedding in embeddings {
            sqlx::query(
                r#"
                INSERT INTO message_embeddings (owner_uuid, model, text_snapshot, vector, language)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(owner_uuid, model) DO UPDATE SET
                    text_snapshot = excluded.text_snapshot,
                    vector = excluded.vector,
                    language = excluded.language
                "#,
            )
            .bind(embedding.owner_uuid.to_string())
            .bind(&embedding.model)
            .bind(&embedding.text_snapshot)
            .bind(serde_json::to_string(&embedding.vector)?)
            .bind(&embedding.language)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn get_message_embeddings(&self, uuids: &[Uuid]) -> MemoriaResult<Vec<TextEmbedding>> {
        if uuids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; uuids.len()].join(", ");
        let sql = format!("SELECT * FROM message_embeddings WHERE owner_uuid IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for uuid in uuids {
            query = query.bind(uuid.to_string());
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|r| embedding_from_row(r, EmbeddingOwnerKind::Message))
            .collect()
    }

    async fn put_summary_embedding(&self, embedding: TextEmbedding) -> MemoriaResult<()> {
        sqlx::query(
            r#"
            INSERT INTO summary_embeddings (owner_uuid, model, text_snapshot, vector, language)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(owner_uuid, model) DO UPDATE SET
                text_snapshot = excluded.text_snapshot,
                vector = excluded.vector,
                language = excluded.language
            "#,
        )
        .bind(embedding.owner_uuid.to_string())
        .bind(&embedding.model)
        .bind(&embedding.text_snapshot)
        .bind(serde_json::to_string(&embedding.vector)?)
        .bind(&embedding.language)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn search_memory(
        &self,
        session_id: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> MemoriaResult<Vec<SearchHit>> {
        let message_rows = sqlx::query(
            r#"
            SELECT e.* FROM message_embeddings e
            JOIN messages m ON m.uuid = e.owner_uuid
            WHERE m.session_id = ?
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        let summary_rows = sqlx::query(
            r#"
            SELECT e.* FROM summary_embeddings e
            JOIN summaries s ON s.uuid = e.owner_uuid
            WHERE s.session_id = ?
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        let mut hits = Vec::new();
        for row in &message_rows {
            let embedding = embedding_from_row(row, EmbeddingOwnerKind::Message)?;
            let distance = l2_distance(query_embedding, &embedding.vector);
            let message = self
                .get_messages_by_uuid(session_id, std::slice::from_ref(&embedding.owner_uuid))
                .await?
                .into_iter()
                .next();
            if let Some(message) = message {
                hits.push(SearchHit::Message(message, distance));
            }
        }
        for row in &summary_rows {
            let embedding = embedding_from_row(row, EmbeddingOwnerKind::Summary)?;
            let distance = l2_distance(query_embedding, &embedding.vector);
            if let Ok(summary) = self.get_summary_by_uuid(embedding.owner_uuid).await {
                hits.push(SearchHit::Summary(summary, distance));
            }
        }

        hits.sort_by(|a, b| {
            let da = match a {
                SearchHit::Message(_, d) | SearchHit::Summary(_, d) => *d,
            };
            let db = match b {
                SearchHit::Message(_, d) | SearchHit::Summary(_, d) => *d,
            };
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn search_sessions(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> MemoriaResult<Vec<(Session, f32)>> {
        let rows = sqlx::query(
            r#"
            SELECT s.session_id AS session_id, e.vector AS vector FROM message_embeddings e
            JOIN messages m ON m.uuid = e.owner_uuid
            JOIN sessions s ON s.session_id = m.session_id
            WHERE s.deleted_at IS NULL
            UNION ALL
            SELECT s.session_id AS session_id, e.vector AS vector FROM summary_embeddings e
            JOIN summaries su ON su.uuid = e.owner_uuid
            JOIN sessions s ON s.session_id = su.session_id
            WHERE s.deleted_at IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut best: std::collections::HashMap<String, f32> = std::collections::HashMap::new();
        for row in &rows {
            let session_id: String = row.try_get("session_id")?;
            let vector_raw: String = row.try_get("vector")?;
            let vector: Vec<f32> = serde_json::from_str(&vector_raw)?;
            let distance = l2_distance(query_embedding, &vector);
            best.entry(session_id)
                .and_modify(|d| {
                    if distance < *d {
                        *d = distance;
                    }
                })
                .or_insert(distance);
        }

        let mut scored = Vec::with_capacity(best.len());
        for (session_id, distance) in best {
            if let Ok(session) = self.get_session(&session_id).await {
                scored.push((session, distance));
            }
        }
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn purge_deleted(&self) -> MemoriaResult<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(PURGE_GRACE_DAYS);
        let rows = sqlx::query("SELECT session_id FROM sessions WHERE deleted_at IS NOT NULL AND deleted_at < ?")
            .bind(cutoff.timestamp_millis())
            .fetch_all(&self.pool)
            .await?;

        let mut purged = 0u64;
        for row in rows {
            let session_id: String = row.try_get("session_id")?;
            let mut tx = self.pool.begin().await?;
            sqlx::query(
                "DELETE FROM message_embeddings WHERE owner_uuid IN (SELECT uuid FROM messages WHERE session_id = ?)",
            )
            .bind(&session_id)
            .execute(&mut *tx)
            .await?;
            sqlx::query(
                "DELETE FROM summary_embeddings WHERE owner_uuid IN (SELECT uuid FROM summaries WHERE session_id = ?)",
            )
            .bind(&session_id)
            .execute(&mut *tx)
            .await?;
            sqlx::query("DELETE FROM summaries WHERE session_id = ?")
                .bind(&session_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM messages WHERE session_id = ?")
                .bind(&session_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM sessions WHERE session_id = ?")
                .bind(&session_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            purged += 1;
        }

        if purged > 0 {
            warn!(purged, "hard-deleted sessions past their soft-delete grace period");
        }
        Ok(purged)
    }
}

#[async_trait]
impl DocumentStore for SqliteMemoryStore {
    async fn write_document_embeddings(
        &self,
        collection_name: &str,
        dimensions: usize,
        items: Vec<(Uuid, Vec<f32>)>,
    ) -> MemoriaResult<()> {
        let table_name = schema::ensure_document_table(&self.pool, collection_name, dimensions).await?;
        let sql = format!(r#"UPDATE "{table_name}" SET vector = ?, is_embedded = 1 WHERE uuid = ?"#);
        for (uuid, vector) in items {
            sqlx::query(&sql)
                .bind(serde_json::to_string(&vector)?)
                .bind(uuid.to_string())
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_store() -> SqliteMemoryStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteMemoryStore::new(pool).await.unwrap()
    }

    #[tokio::test]
    async fn put_memory_creates_session_and_orders_messages() {
        let store = test_store().await;
        let batch = MemoryBatch {
            messages: vec![
                Message::new("s1", "user", "hello"),
                Message::new("s1", "assistant", "hi there"),
            ],
        };
        let saved = store.put_memory("s1", batch, false).await.unwrap();
        assert_eq!(saved.len(), 2);

        let session = store.get_session("s1").await.unwrap();
        assert_eq!(session.session_id, "s1");
    }

    #[tokio::test]
    async fn put_memory_rejects_deleted_session() {
        let store = test_store().await;
        store
            .put_memory("s1", MemoryBatch { messages: vec![Message::new("s1", "user", "hi")] }, false)
            .await
            .unwrap();
        store.delete_session("s1").await.unwrap();

        let result = store
            .put_memory("s1", MemoryBatch { messages: vec![Message::new("s1", "user", "hi again")] }, false)
            .await;
        assert!(matches!(result, Err(MemoriaError::Conflict(_))));
    }

    #[tokio::test]
    async fn get_memory_with_last_n_returns_newest_in_order() {
        let store = test_store().await;
        let mut messages = Vec::new();
        for i in 0..5 {
            messages.push(Message::new("s1", "user", format!("msg {i}")));
        }
        store.put_memory("s1", MemoryBatch { messages }, false).await.unwrap();

        let memory = store.get_memory("s1", 2).await.unwrap();
        assert_eq!(memory.messages.len(), 2);
        assert_eq!(memory.messages[0].content, "msg 3");
        assert_eq!(memory.messages[1].content, "msg 4");
    }

    #[tokio::test]
    async fn get_memory_zero_with_summary_returns_only_newer_messages() {
        let store = test_store().await;
        let msgs: Vec<Message> = (0..4).map(|i| Message::new("s1", "user", format!("m{i}"))).collect();
        let saved = store.put_memory("s1", MemoryBatch { messages: msgs }, false).await.unwrap();

        let summary = Summary::new("s1", "summary text", saved[1].uuid);
        store.create_summary("s1", &summary).await.unwrap();

        let memory = store.get_memory("s1", 0).await.unwrap();
        assert!(memory.summary.is_some());
        assert_eq!(memory.messages.len(), 2);
        assert_eq!(memory.messages[0].content, "m2");
    }

    #[tokio::test]
    async fn update_messages_strips_system_without_privilege() {
        let store = test_store().await;
        let saved = store
            .put_memory("s1", MemoryBatch { messages: vec![Message::new("s1", "user", "hi")] }, false)
            .await
            .unwrap();
        let uuid = saved[0].uuid;

        let update = MessageUpdate::metadata_only(uuid, serde_json::json!({"system": {"x": 1}, "keep": 2}));
        let updated = store.update_messages("s1", vec![update], false, false).await.unwrap();
        assert_eq!(updated[0].metadata, serde_json::json!({"keep": 2}));
    }

    #[tokio::test]
    async fn embeddings_roundtrip_and_idempotent_write() {
        let store = test_store().await;
        let saved = store
            .put_memory("s1", MemoryBatch { messages: vec![Message::new("s1", "user", "hi")] }, false)
            .await
            .unwrap();
        let uuid = saved[0].uuid;
        let embedding = TextEmbedding {
            owner_kind: EmbeddingOwnerKind::Message,
            owner_uuid: uuid,
            text_snapshot: "hi".to_string(),
            vector: vec![0.1, 0.2, 0.3],
            model: "mock".to_string(),
            language: None,
        };
        store.create_message_embeddings(vec![embedding.clone()]).await.unwrap();
        store.create_message_embeddings(vec![embedding]).await.unwrap();

        let fetched = store.get_message_embeddings(&[uuid]).await.unwrap();
        assert_eq!(fetched.len(), 1);
    }
}
