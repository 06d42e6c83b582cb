// tests/durability_test.rs
// Both the memory store and the durable queue claim durability, not just
// in-process consistency — this is the one suite that actually reopens a
// file-backed SQLite database across pool instances rather than reusing
// `sqlite::memory:`, to prove state survives a reconnect.

use std::sync::Arc;

use memoria_core::memory::sqlite::SqliteMemoryStore;
use memoria_core::memory::traits::MemoryBatch;
use memoria_core::memory::types::{Message, TaskEnvelope};
use memoria_core::memory::MemoryStore;
use memoria_core::queue::{DurableQueue, Topic};
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

fn db_url(path: &std::path::Path) -> String {
    format!("sqlite://{}", path.display())
}

#[tokio::test]
async fn messages_survive_reopening_the_store_on_a_fresh_pool() {
    let dir = tempfile::tempdir().unwrap();
    let url = db_url(&dir.path().join("memoria.db"));

    let uuid = {
        let pool = SqlitePoolOptions::new()
            .connect(&format!("{url}?mode=rwc"))
            .await
            .unwrap();
        let store = SqliteMemoryStore::new(pool).await.unwrap();
        let saved = store
            .put_memory(
                "durable-session",
                MemoryBatch { messages: vec![Message::new("durable-session", "user", "remember this")] },
                true,
            )
            .await
            .unwrap();
        saved[0].uuid
    };

    // Fresh pool, fresh `SqliteMemoryStore` instance, same file on disk.
    let pool = SqlitePoolOptions::new().connect(&format!("{url}?mode=rwc")).await.unwrap();
    let reopened: Arc<dyn MemoryStore> = Arc::new(SqliteMemoryStore::new(pool).await.unwrap());
    let messages = reopened.get_messages_by_uuid("durable-session", &[uuid]).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "remember this");
}

#[tokio::test]
async fn unacked_envelope_survives_reopening_the_queue_on_a_fresh_pool() {
    let dir = tempfile::tempdir().unwrap();
    let url = db_url(&dir.path().join("memoria_queue.db"));
    let message_id;

    {
        let pool = SqlitePoolOptions::new().connect(&format!("{url}?mode=rwc")).await.unwrap();
        let queue = DurableQueue::new(pool);
        let envelope = TaskEnvelope::for_messages("s1", vec![Uuid::new_v4()], None);
        message_id = envelope.message_id;
        queue.publish(Topic::MessageTokenCount.as_str(), &envelope).await.unwrap();
        // Deliberately no poll_next/ack — the envelope should still be
        // waiting for the same consumer group after the pool is dropped.
    }

    let pool = SqlitePoolOptions::new().connect(&format!("{url}?mode=rwc")).await.unwrap();
    let queue = DurableQueue::new(pool);
    let (_, envelope) = queue
        .poll_next(Topic::MessageTokenCount.as_str(), "reopened-group")
        .await
        .unwrap()
        .expect("the published envelope should still be there after reopening");
    assert_eq!(envelope.message_id, message_id);
}
