// src/memory/sqlite/advisory_lock.rs
// Cross-process advisory lock keyed by hash(session-id), emulated on top of
// SQLite (which has no `pg_advisory_lock`). See DESIGN.md's Open Question
// resolution for why an emulated lock is the right call here.

use std::time::Duration;

use sqlx::SqlitePool;
use tokio::time::sleep;

use crate::error::{MemoriaError, MemoriaResult};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Holds a row in `advisory_locks` for `key` for as long as the guard lives.
pub struct AdvisoryLockGuard<'a> {
    pool: &'a SqlitePool,
    key: String,
}

impl<'a> Drop for AdvisoryLockGuard<'a> {
    fn drop(&mut self) {
        let pool = self.pool.clone();
        let key = self.key.clone();
        tokio::spawn(async move {
            let _ = sqlx::query("DELETE FROM advisory_locks WHERE key = ?")
                .bind(&key)
                .execute(&pool)
                .await;
        });
    }
}

/// Acquire the advisory lock for `key`, retrying until `timeout` elapses.
pub async fn acquire<'a>(
    pool: &'a SqlitePool,
    key: &str,
    holder: &str,
    timeout: Duration,
) -> MemoriaResult<AdvisoryLockGuard<'a>> {
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO advisory_locks (key, holder, acquired_at) VALUES (?, ?, ?)",
        )
        .bind(key)
        .bind(holder)
        .bind(chrono::Utc::now().timestamp())
        .execute(pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(AdvisoryLockGuard {
                pool,
                key: key.to_string(),
            });
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(MemoriaError::transient(format!(
                "timed out acquiring advisory lock for {key}"
            )));
        }

        sleep(POLL_INTERVAL).await;
    }
}

/// Stable advisory-lock key for a session id.
pub fn session_lock_key(session_id: &str) -> String {
    format!("session:{session_id}")
}
