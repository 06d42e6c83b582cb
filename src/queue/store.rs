// src/queue/store.rs
// SQL-backed durable queue. One physical log table per topic, one offsets
// table per topic tracking each consumer-group's committed-through offset.
// Grounded in the same plain `sqlx::query(...).bind(...)` idiom as
// `memory::sqlite::store`, following the CRUD-over-sqlx shape of
// `backend/src/operations/tasks/store.rs`.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::MemoriaResult;
use crate::memory::types::TaskEnvelope;

fn log_table(topic: &str) -> String {
    format!("queue_log_{topic}")
}

fn offsets_table(topic: &str) -> String {
    format!("queue_offsets_{topic}")
}

/// A durable, topic-partitioned publish/subscribe queue.
/// Holds its own pool, kept separate from the memory store's: the queue
/// needs repeatable-read-equivalent locking around its fetch-then-claim
/// step, while the store runs plain read-committed.
pub struct DurableQueue {
    pool: SqlitePool,
}

impl DurableQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_topic(&self, topic: &str) -> MemoriaResult<()> {
        let log = log_table(topic);
        let create_log = format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{log}" (
                "offset"    INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid        TEXT NOT NULL,
                payload     TEXT NOT NULL,
                metadata    TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            )
            "#
        );
        sqlx::query(&create_log).execute(&self.pool).await?;

        let offsets = offsets_table(topic);
        let create_offsets = format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{offsets}" (
                consumer_group    TEXT PRIMARY KEY,
                committed_offset  INTEGER NOT NULL
            )
            "#
        );
        sqlx::query(&create_offsets).execute(&self.pool).await?;
        Ok(())
    }

    /// Appends one envelope to `topic`'s log, inside a single transaction
    /// (`Publish`). Returns the assigned offset.
    pub async fn publish(&self, topic: &str, envelope: &TaskEnvelope) -> MemoriaResult<i64> {
        self.ensure_topic(topic).await?;
        let log = log_table(topic);
        let sql = format!(
            r#"INSERT INTO "{log}" (uuid, payload, metadata, created_at) VALUES (?, ?, ?, ?)"#
        );
        let result = sqlx::query(&sql)
            .bind(envelope.message_id.to_string())
            .bind(serde_json::to_string(&envelope.payload)?)
            .bind(serde_json::to_string(&envelope.metadata)?)
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await?;
        let offset = result.last_insert_rowid();
        debug!(topic, offset, "published envelope");
        Ok(offset)
    }

    /// Fetches the next undelivered envelope for `consumer_group` on
    /// `topic`, if any, without advancing the committed offset — the
    /// caller acks explicitly after a successful handler run. Uses
    /// `BEGIN IMMEDIATE` to take SQLite's write lock for the read, the
    /// closest equivalent this engine has to Postgres's repeatable-read +
    /// row-locking guarantee against double delivery within a poll cycle.
    pub async fn poll_next(
        &self,
        topic: &str,
        consumer_group: &str,
    ) -> MemoriaResult<Option<(i64, TaskEnvelope)>> {
        self.ensure_topic(topic).await?;
        let log = log_table(topic);
        let offsets = offsets_table(topic);

        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!(
            r#"INSERT OR IGNORE INTO "{offsets}" (consumer_group, committed_offset) VALUES (?, 0)"#
        ))
        .bind(consumer_group)
        .execute(&mut *tx)
        .await?;

        let committed: i64 = sqlx::query_scalar(&format!(
            r#"SELECT committed_offset FROM "{offsets}" WHERE consumer_group = ?"#
        ))
        .bind(consumer_group)
        .fetch_one(&mut *tx)
        .await?;

        let row = sqlx::query(&format!(
            r#"SELECT * FROM "{log}" WHERE "offset" > ? ORDER BY "offset" ASC LIMIT 1"#
        ))
        .bind(committed)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let offset: i64 = row.try_get("offset")?;
        let payload_raw: String = row.try_get("payload")?;
        let metadata_raw: String = row.try_get("metadata")?;
        let uuid_raw: String = row.try_get("uuid")?;

        let envelope = TaskEnvelope {
            message_id: uuid::Uuid::parse_str(&uuid_raw)
                .map_err(|e| crate::error::MemoriaError::internal(e.to_string()))?,
            metadata: serde_json::from_str(&metadata_raw)?,
            payload: serde_json::from_str(&payload_raw)?,
        };

        Ok(Some((offset, envelope)))
    }

    /// Advances `consumer_group`'s committed offset on `topic` to `offset`,
    /// as long as it moves forward. Called only after the handler's
    /// side-effects have completed without error.
    pub async fn ack(&self, topic: &str, consumer_group: &str, offset: i64) -> MemoriaResult<()> {
        let offsets = offsets_table(topic);
        sqlx::query(&format!(
            r#"UPDATE "{offsets}" SET committed_offset = ? WHERE consumer_group = ? AND committed_offset < ?"#
        ))
        .bind(offset)
        .bind(consumer_group)
        .bind(offset)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Current committed offset for `(topic, consumer_group)`, 0 if never
    /// polled before. Exposed for tests and diagnostics.
    pub async fn committed_offset(&self, topic: &str, consumer_group: &str) -> MemoriaResult<i64> {
        self.ensure_topic(topic).await?;
        let offsets = offsets_table(topic);
        let committed: Option<i64> = sqlx::query_scalar(&format!(
            r#"SELECT committed_offset FROM "{offsets}" WHERE consumer_group = ?"#
        ))
        .bind(consumer_group)
        .fetch_optional(&self.pool)
        .await?;
        Ok(committed.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::TaskEnvelope;
    use sqlx::sqlite::SqlitePoolOptions;
    use uuid::Uuid;

    async fn test_queue() -> DurableQueue {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        DurableQueue::new(pool)
    }

    #[tokio::test]
    async fn publish_then_poll_delivers_in_order() {
        let queue = test_queue().await;
        let e1 = TaskEnvelope::for_messages("s1", vec![Uuid::new_v4()], None);
        let e2 = TaskEnvelope::for_messages("s1", vec![Uuid::new_v4()], None);
        queue.publish("message_token_count", &e1).await.unwrap();
        queue.publish("message_token_count", &e2).await.unwrap();

        let (offset1, first) = queue
            .poll_next("message_token_count", "grp")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.message_id, e1.message_id);
        queue.ack("message_token_count", "grp", offset1).await.unwrap();

        let (_, second) = queue
            .poll_next("message_token_count", "grp")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.message_id, e2.message_id);
    }

    #[tokio::test]
    async fn unacked_envelope_is_redelivered() {
        let queue = test_queue().await;
        let e1 = TaskEnvelope::for_messages("s1", vec![Uuid::new_v4()], None);
        queue.publish("message_ner", &e1).await.unwrap();

        let (_, first) = queue.poll_next("message_ner", "grp").await.unwrap().unwrap();
        assert_eq!(first.message_id, e1.message_id);

        // No ack — next poll must return the same envelope again.
        let (_, redelivered) = queue.poll_next("message_ner", "grp").await.unwrap().unwrap();
        assert_eq!(redelivered.message_id, e1.message_id);
    }

    #[tokio::test]
    async fn independent_consumer_groups_each_see_every_message() {
        let queue = test_queue().await;
        let e1 = TaskEnvelope::for_messages("s1", vec![Uuid::new_v4()], None);
        queue.publish("message_embedder", &e1).await.unwrap();

        let (offset_a, _) = queue.poll_next("message_embedder", "group-a").await.unwrap().unwrap();
        queue.ack("message_embedder", "group-a", offset_a).await.unwrap();

        let (_, for_b) = queue.poll_next("message_embedder", "group-b").await.unwrap().unwrap();
        assert_eq!(for_b.message_id, e1.message_id);
    }
}
