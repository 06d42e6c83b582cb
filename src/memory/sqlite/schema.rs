// src/memory/sqlite/schema.rs
// Inline schema, auto-initialized on pool construction — mirrors the
// teacher's `CREATE TABLE IF NOT EXISTS` style (no separate migrations
// directory in backend/src/memory/storage/sqlite either).

use sqlx::SqlitePool;

use crate::error::MemoriaResult;

pub async fn init_schema(pool: &SqlitePool) -> MemoriaResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            session_id   TEXT PRIMARY KEY,
            uuid         TEXT NOT NULL,
            created_at   INTEGER NOT NULL,
            updated_at   INTEGER NOT NULL,
            deleted_at   INTEGER,
            user_id      TEXT,
            metadata     TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            uuid         TEXT PRIMARY KEY,
            session_id   TEXT NOT NULL,
            created_at   INTEGER NOT NULL,
            seq          INTEGER NOT NULL,
            role         TEXT NOT NULL,
            content      TEXT NOT NULL,
            metadata     TEXT NOT NULL,
            token_count  INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, created_at, seq)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS summaries (
            uuid           TEXT PRIMARY KEY,
            session_id     TEXT NOT NULL,
            created_at     INTEGER NOT NULL,
            text           TEXT NOT NULL,
            summary_point  TEXT NOT NULL,
            token_count    INTEGER NOT NULL DEFAULT 0,
            metadata       TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_summaries_session ON summaries(session_id, created_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS message_embeddings (
            owner_uuid    TEXT NOT NULL,
            model         TEXT NOT NULL,
            text_snapshot TEXT NOT NULL,
            vector        TEXT NOT NULL,
            language      TEXT,
            PRIMARY KEY (owner_uuid, model)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS summary_embeddings (
            owner_uuid    TEXT NOT NULL,
            model         TEXT NOT NULL,
            text_snapshot TEXT NOT NULL,
            vector        TEXT NOT NULL,
            language      TEXT,
            PRIMARY KEY (owner_uuid, model)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS advisory_locks (
            key         TEXT PRIMARY KEY,
            holder      TEXT NOT NULL,
            acquired_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_collections (
            collection_name TEXT PRIMARY KEY,
            dimensions      INTEGER NOT NULL,
            table_name      TEXT NOT NULL,
            created_at      INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Builds a `docstore_{name}_{dim}` table name capped at 63 chars total.
/// Sanitizes the collection name to `[a-z0-9_]` first.
pub fn docstore_table_name(collection_name: &str, dimensions: usize) -> String {
    let sanitized: String = collection_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();

    let suffix = format!("_{dimensions}");
    let prefix = "docstore_";
    let max_name_len = 63usize.saturating_sub(prefix.len() + suffix.len());
    let truncated: String = sanitized.chars().take(max_name_len).collect();

    format!("{prefix}{truncated}{suffix}")
}

pub async fn ensure_document_table(
    pool: &SqlitePool,
    collection_name: &str,
    dimensions: usize,
) -> MemoriaResult<String> {
    let table_name = docstore_table_name(collection_name, dimensions);

    let create_sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS "{table_name}" (
            uuid        TEXT PRIMARY KEY,
            content     TEXT NOT NULL,
            vector      TEXT,
            is_embedded INTEGER NOT NULL DEFAULT 0
        )
        "#
    );
    sqlx::query(&create_sql).execute(pool).await?;

    sqlx::query(
        r#"
        INSERT OR IGNORE INTO document_collections (collection_name, dimensions, table_name, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(collection_name)
    .bind(dimensions as i64)
    .bind(&table_name)
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await?;

    Ok(table_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docstore_table_name_is_capped_at_63_chars() {
        let long_name = "x".repeat(200);
        let table = docstore_table_name(&long_name, 1536);
        assert!(table.len() <= 63, "{} chars", table.len());
        assert!(table.starts_with("docstore_"));
        assert!(table.ends_with("_1536"));
    }

    #[test]
    fn docstore_table_name_sanitizes_special_chars() {
        let table = docstore_table_name("My Collection!", 768);
        assert_eq!(table, "docstore_my_collection__768");
    }
}
