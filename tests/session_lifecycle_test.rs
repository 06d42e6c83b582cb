// tests/session_lifecycle_test.rs
// End-to-end scenarios over the public `SessionApi` surface: session
// lifecycle, ingest validation, and metadata privilege stripping, all
// against an in-memory SQLite store with no enrichment extractors enabled
// (the router is exercised separately in task_router_test.rs).

use std::sync::Arc;

use memoria_core::api::SessionApi;
use memoria_core::config::memory::{ExtractorsConfig, MemoryConfig};
use memoria_core::error::MemoriaError;
use memoria_core::ingest::{IncomingMessage, IngestCoordinator};
use memoria_core::llm::mock::MockLlmProvider;
use memoria_core::memory::sqlite::SqliteMemoryStore;
use memoria_core::memory::MemoryStore;
use memoria_core::publisher::TaskPublisher;
use memoria_core::queue::DurableQueue;
use serde_json::json;
use sqlx::sqlite::SqlitePoolOptions;

fn no_extractors() -> ExtractorsConfig {
    ExtractorsConfig {
        summarizer_enabled: false,
        summarizer_embeddings_enabled: false,
        summarizer_entities_enabled: false,
        embeddings_enabled: false,
        entities_enabled: false,
        intent_enabled: false,
        documents_embeddings_enabled: false,
        documents_embeddings_max_procs: 1,
        documents_embeddings_chunk_size: 1,
        documents_embeddings_buffer_size: 1,
        documents_embeddings_dimensions: 8,
    }
}

async fn test_api(memory: MemoryConfig) -> (SessionApi, Arc<dyn MemoryStore>) {
    let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
    let store: Arc<dyn MemoryStore> = Arc::new(SqliteMemoryStore::new(pool).await.unwrap());

    let queue_pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
    let queue = Arc::new(DurableQueue::new(queue_pool));
    let publisher = Arc::new(TaskPublisher::new(queue, no_extractors()));
    let ingest = Arc::new(IngestCoordinator::new(store.clone(), publisher, memory));

    let api = SessionApi::new(store.clone(), ingest, Arc::new(MockLlmProvider::default()));
    (api, store)
}

fn default_memory_config() -> MemoryConfig {
    MemoryConfig {
        message_window: 4,
        default_last_n: 2,
        max_messages_per_ingest: 5,
        max_content_len_standard: 200,
        max_content_len_elevated: 10_000,
    }
}

fn msg(role: &str, content: &str) -> IncomingMessage {
    IncomingMessage { role: role.to_string(), content: content.to_string(), metadata: json!({}) }
}

// S1: create a session, post messages right up to the window boundary, and
// confirm GetMemory(lastN=0) returns every message when no summary exists
// yet (this test's summarizer is disabled, so no summary is ever produced;
// the summary_point-bounded lastN=0 case is covered at the store layer and
// in the summarizer's own integration tests).
#[tokio::test]
async fn posts_messages_at_window_boundary_and_reads_all_without_a_summary() {
    let (api, _store) = test_api(default_memory_config()).await;
    api.create_session("s1", None).await.unwrap();

    let messages: Vec<_> = (0..4).map(|i| msg("user", &format!("message {i}"))).collect();
    let uuids = api.ingest("s1", messages, false, None).await.unwrap();
    assert_eq!(uuids.len(), 4);

    let memory = api.get_memory("s1", 0).await.unwrap();
    assert!(memory.summary.is_none());
    assert_eq!(memory.messages.len(), 4, "lastN=0 with no summary returns every message");

    let two_newest = api.get_memory("s1", 2).await.unwrap();
    assert_eq!(two_newest.messages.len(), 2);
    assert_eq!(two_newest.messages[1].content, "message 3");
}

// S2: a message with an empty/whitespace role is rejected, and nothing is
// persisted for that call.
#[tokio::test]
async fn rejects_empty_role_and_persists_nothing() {
    let (api, _store) = test_api(default_memory_config()).await;
    let result = api.ingest("s2", vec![msg("  ", "hi")], false, None).await;
    assert!(matches!(result, Err(MemoriaError::BadRequest(_))));

    let memory = api.get_memory("s2", 0).await;
    assert!(matches!(memory, Err(MemoriaError::NotFound(_))));
}

// S3: exceeding max_messages_per_ingest in one call is rejected outright.
#[tokio::test]
async fn rejects_ingest_batch_over_the_per_call_cap() {
    let (api, _store) = test_api(default_memory_config()).await;
    let messages: Vec<_> = (0..6).map(|i| msg("user", &format!("m{i}"))).collect();
    let result = api.ingest("s3", messages, false, None).await;
    assert!(matches!(result, Err(MemoriaError::BadRequest(_))));
}

// S4: a non-privileged ingest has its `system` metadata subtree stripped
// before it ever reaches storage; a privileged one keeps it.
#[tokio::test]
async fn strips_system_metadata_unless_privileged() {
    let (api, store) = test_api(default_memory_config()).await;

    let mut unprivileged = msg("user", "hi");
    unprivileged.metadata = json!({"system": {"intent": "spying"}, "mood": "curious"});
    let uuids = api.ingest("s4", vec![unprivileged], false, None).await.unwrap();
    let stored = store.get_messages_by_uuid("s4", &uuids).await.unwrap();
    assert_eq!(stored[0].metadata, json!({"mood": "curious"}));

    let mut privileged = msg("assistant", "ack");
    privileged.metadata = json!({"system": {"intent": "noted"}});
    let uuids = api.ingest("s4", vec![privileged], true, None).await.unwrap();
    let stored = store.get_messages_by_uuid("s4", &uuids).await.unwrap();
    assert_eq!(stored[0].metadata, json!({"system": {"intent": "noted"}}));
}

// S5: DeleteSession is idempotent, but a session that never existed still
// surfaces NotFound.
#[tokio::test]
async fn delete_session_is_idempotent_but_not_for_sessions_that_never_existed() {
    let (api, _store) = test_api(default_memory_config()).await;
    api.create_session("s5", None).await.unwrap();
    api.ingest("s5", vec![msg("user", "hi")], false, None).await.unwrap();

    api.delete_session("s5").await.unwrap();
    api.delete_session("s5").await.unwrap();

    let never_existed = api.delete_session("ghost-session").await;
    assert!(matches!(never_existed, Err(MemoriaError::NotFound(_))));
}

// S6: two concurrent ingests into the same session never lose a message —
// the coordinator's per-session lock serializes the read-modify-write.
#[tokio::test]
async fn concurrent_ingests_into_one_session_preserve_every_message() {
    let (api, _store) = test_api(default_memory_config()).await;
    let api = Arc::new(api);
    let a = api.clone();
    let b = api.clone();

    let (r1, r2) = tokio::join!(
        a.ingest("s6", vec![msg("user", "a1"), msg("user", "a2")], false, None),
        b.ingest("s6", vec![msg("user", "b1"), msg("user", "b2")], false, None),
    );
    assert_eq!(r1.unwrap().len(), 2);
    assert_eq!(r2.unwrap().len(), 2);

    let memory = api.get_memory("s6", 10).await.unwrap();
    assert_eq!(memory.messages.len(), 4);
}
