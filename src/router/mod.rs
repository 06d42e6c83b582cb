// src/router/mod.rs
// Binds topic -> handler on top of the durable queue. Each
// bound task gets its own polling subscriber loop; the middleware chain
// (throttle, recoverer, retry, poison, circuit breaker) wraps every
// dispatch. Grounded in shape on `backend/src/tasks/mod.rs`'s
// `TaskManager` (interval-driven spawned loops, `Vec<JoinHandle<()>>`,
// abort-based shutdown), generalized from a fixed list of named
// background jobs to an open set of topic-bound handlers.

pub mod middleware;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use metrics::{counter, histogram};
use tracing::{error, info, warn, Instrument};

use crate::config::router::{QueueConfig, RouterConfig};
use crate::error::{MemoriaError, MemoriaResult};
use crate::memory::types::TaskEnvelope;
use crate::queue::{DurableQueue, Topic};
use middleware::{recover, retry_with_backoff, CircuitBreaker, GlobalThrottle, PoisonPublisher, RetryPolicy};

/// An explicit capability set rather than a base-class hierarchy: a
/// handler only needs to say what topic it binds and how to execute one
/// envelope.
#[async_trait]
pub trait Task: Send + Sync {
    fn topic(&self) -> Topic;

    async fn execute(&self, envelope: &TaskEnvelope) -> MemoriaResult<()>;

    /// Called once, after the retry budget for one envelope is exhausted
    /// and just before it is poisoned. Default is a no-op; handlers that
    /// need to record something task-specific can override it.
    async fn handle_error(&self, _envelope: &TaskEnvelope, _error: &MemoriaError) {}
}

/// Owns one subscriber loop per bound topic and the shared middleware
/// instances applied to every dispatch.
pub struct TaskRouter {
    queue: Arc<DurableQueue>,
    consumer_group: String,
    throttle: Arc<GlobalThrottle>,
    circuit_breaker: Arc<CircuitBreaker>,
    retry_policy: RetryPolicy,
    poison: Arc<PoisonPublisher>,
    handler_timeout: Duration,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl TaskRouter {
    pub fn new(
        queue: Arc<DurableQueue>,
        router_config: &RouterConfig,
        queue_config: &QueueConfig,
        consumer_group: impl Into<String>,
    ) -> MemoriaResult<Self> {
        Ok(Self {
            poison: Arc::new(PoisonPublisher::new(queue.clone())),
            throttle: Arc::new(GlobalThrottle::new(router_config.throttle_per_second)?),
            circuit_breaker: Arc::new(CircuitBreaker::new(
                router_config.circuit_failure_threshold,
                Duration::from_secs(router_config.circuit_failure_window_secs),
                Duration::from_secs(router_config.circuit_cooldown_secs),
            )),
            retry_policy: RetryPolicy::from_config(router_config),
            handler_timeout: Duration::from_secs(router_config.handler_timeout_secs),
            poll_interval: queue_config.poll_interval(),
            queue,
            consumer_group: consumer_group.into(),
            shutdown: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
        })
    }

    /// Binds `task` to its topic and starts its subscriber loop.
    pub fn bind<T: Task + 'static>(&mut self, task: T) {
        self.bind_arc(Arc::new(task));
    }

    pub fn bind_arc(&mut self, task: Arc<dyn Task>) {
        let topic = task.topic().as_str();
        let queue = self.queue.clone();
        let consumer_group = self.consumer_group.clone();
        let throttle = self.throttle.clone();
        let circuit_breaker = self.circuit_breaker.clone();
        let retry_policy = self.retry_policy;
        let poison = self.poison.clone();
        let handler_timeout = self.handler_timeout;
        let poll_interval = self.poll_interval;
        let shutdown = self.shutdown.clone();

        let handle = tokio::spawn(async move {
            info!(topic, "subscriber loop started");
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                if !circuit_breaker.is_available(topic) {
                    continue;
                }
                throttle.acquire().await;

                match queue.poll_next(topic, &consumer_group).await {
                    Ok(Some((offset, envelope))) => {
                        dispatch(
                            task.as_ref(),
                            &queue,
                            &poison,
                            &circuit_breaker,
                            &retry_policy,
                            handler_timeout,
                            topic,
                            &consumer_group,
                            offset,
                            envelope,
                        )
                        .await;
                    }
                    Ok(None) => {}
                    Err(e) => error!(topic, error = %e, "poll failed"),
                }
            }
            info!(topic, "subscriber loop stopped");
        });
        self.handles.push(handle);
    }

    /// Stops accepting new work and waits up to `grace` for in-flight
    /// dispatches to finish, aborting whatever is still running past it.
    pub async fn shutdown(self, grace: Duration) {
        self.shutdown.store(true, Ordering::Relaxed);
        let abort_handles: Vec<_> = self.handles.iter().map(|h| h.abort_handle()).collect();
        if tokio::time::timeout(grace, join_all(self.handles)).await.is_err() {
            warn!("shutdown grace period elapsed, aborting remaining subscriber loops");
            for ah in abort_handles {
                ah.abort();
            }
        }
    }
}

async fn run_with_timeout(
    task: &dyn Task,
    envelope: &TaskEnvelope,
    timeout: Duration,
) -> MemoriaResult<()> {
    match tokio::time::timeout(timeout, task.execute(envelope)).await {
        Ok(result) => result,
        Err(_) => Err(MemoriaError::transient("task handler timed out")),
    }
}

#[allow(clippy::too_many_arguments)]
async fn dispatch(
    task: &dyn Task,
    queue: &DurableQueue,
    poison: &PoisonPublisher,
    circuit_breaker: &CircuitBreaker,
    retry_policy: &RetryPolicy,
    handler_timeout: Duration,
    topic: &str,
    consumer_group: &str,
    offset: i64,
    envelope: TaskEnvelope,
) {
    let correlation_id = envelope.correlation_id().map(str::to_string).unwrap_or_default();
    let span = tracing::info_span!("task_dispatch", topic, offset, correlation_id = %correlation_id);

    async {
        let start = Instant::now();
        let attempt = || async { recover(run_with_timeout(task, &envelope, handler_timeout)).await };
        let result = retry_with_backoff(retry_policy, attempt).await;
        histogram!("memoria_task_dispatch_seconds", "topic" => topic.to_string())
            .record(start.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                circuit_breaker.record_success(topic);
                counter!("memoria_task_success_total", "topic" => topic.to_string()).increment(1);
                if let Err(e) = queue.ack(topic, consumer_group, offset).await {
                    error!(topic, offset, error = %e, "failed to ack dispatched envelope");
                }
            }
            Err(e) => {
                warn!(topic, offset, error = %e, "retry budget exhausted, poisoning envelope");
                task.handle_error(&envelope, &e).await;
                circuit_breaker.record_failure(topic);
                poison.poison(topic, &envelope).await;
                counter!("memoria_task_poisoned_total", "topic" => topic.to_string()).increment(1);
                if let Err(ack_err) = queue.ack(topic, consumer_group, offset).await {
                    error!(topic, offset, error = %ack_err, "failed to ack poisoned envelope");
                }
            }
        }
    }
    .instrument(span)
    .await
}
