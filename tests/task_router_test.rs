// tests/task_router_test.rs
// Exercises the durable queue end-to-end through a real `TaskRouter`: a
// handler that eventually succeeds after transient failures, and one that
// never does, to check the retry-then-poison path and exactly-once arrival
// on the poison topic.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use memoria_core::config::router::{QueueConfig, RouterConfig};
use memoria_core::error::{MemoriaError, MemoriaResult};
use memoria_core::memory::types::TaskEnvelope;
use memoria_core::queue::{DurableQueue, Topic};
use memoria_core::router::{Task, TaskRouter};
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

/// Fast-cycling router config so the retry/poll loop completes quickly
/// under `tokio::test` without real wall-clock waits.
fn fast_router_config(max_attempts: u32) -> RouterConfig {
    RouterConfig {
        throttle_per_second: 1_000,
        retry_max_attempts: max_attempts,
        retry_initial_interval_ms: 1,
        retry_multiplier: 1.0,
        retry_max_interval_ms: 5,
        retry_randomization_factor: 0.0,
        handler_timeout_secs: 5,
        circuit_failure_threshold: 100,
        circuit_failure_window_secs: 60,
        circuit_cooldown_secs: 1,
    }
}

fn fast_queue_config() -> QueueConfig {
    QueueConfig { poll_interval_ms: 5 }
}

async fn test_queue() -> Arc<DurableQueue> {
    let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
    Arc::new(DurableQueue::new(pool))
}

/// Fails its first `fail_times` invocations, then succeeds. Used to prove
/// the retry policy actually recovers a handler rather than poisoning it.
struct FlakyTask {
    attempts: AtomicU32,
    fail_times: u32,
}

#[async_trait]
impl Task for FlakyTask {
    fn topic(&self) -> Topic {
        Topic::MessageTokenCount
    }

    async fn execute(&self, _envelope: &TaskEnvelope) -> MemoriaResult<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_times {
            Err(MemoriaError::transient("not ready yet"))
        } else {
            Ok(())
        }
    }
}

/// Always fails. Used to drive an envelope all the way to the poison queue.
struct AlwaysFailsTask;

#[async_trait]
impl Task for AlwaysFailsTask {
    fn topic(&self) -> Topic {
        Topic::MessageNer
    }

    async fn execute(&self, _envelope: &TaskEnvelope) -> MemoriaResult<()> {
        Err(MemoriaError::transient("this handler is terminally broken"))
    }
}

#[tokio::test]
async fn retries_recover_a_handler_that_eventually_succeeds() {
    let queue = test_queue().await;
    let envelope = TaskEnvelope::for_messages("s1", vec![Uuid::new_v4()], None);
    queue.publish(Topic::MessageTokenCount.as_str(), &envelope).await.unwrap();

    let router_config = fast_router_config(5);
    let queue_config = fast_queue_config();
    let mut router = TaskRouter::new(queue.clone(), &router_config, &queue_config, "test-group").unwrap();
    router.bind(FlakyTask { attempts: AtomicU32::new(0), fail_times: 2 });

    // Give the subscriber loop a few poll cycles to retry through to success.
    tokio::time::sleep(Duration::from_millis(200)).await;
    router.shutdown(Duration::from_secs(1)).await;

    let committed = queue.committed_offset(Topic::MessageTokenCount.as_str(), "test-group").await.unwrap();
    assert!(committed >= 1, "the envelope should have been acked after recovering");

    let poisoned = queue.poll_next(Topic::PoisonQueue.as_str(), "audit").await.unwrap();
    assert!(poisoned.is_none(), "a recovered handler must not poison its envelope");
}

#[tokio::test]
async fn exhausted_retries_poison_the_envelope_exactly_once() {
    let queue = test_queue().await;
    let envelope = TaskEnvelope::for_messages("s1", vec![Uuid::new_v4()], None);
    queue.publish(Topic::MessageNer.as_str(), &envelope).await.unwrap();

    let router_config = fast_router_config(2);
    let queue_config = fast_queue_config();
    let mut router = TaskRouter::new(queue.clone(), &router_config, &queue_config, "test-group").unwrap();
    router.bind(AlwaysFailsTask);

    tokio::time::sleep(Duration::from_millis(200)).await;
    router.shutdown(Duration::from_secs(1)).await;

    let (offset, poisoned) = queue
        .poll_next(Topic::PoisonQueue.as_str(), "audit")
        .await
        .unwrap()
        .expect("the envelope should have been poisoned");
    assert_eq!(poisoned.message_id, envelope.message_id);

    // Ack it and confirm there is no second copy waiting behind it.
    queue.ack(Topic::PoisonQueue.as_str(), "audit", offset).await.unwrap();
    let second = queue.poll_next(Topic::PoisonQueue.as_str(), "audit").await.unwrap();
    assert!(second.is_none(), "the envelope must only be poisoned once");
}
