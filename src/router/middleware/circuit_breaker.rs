// src/router/middleware/circuit_breaker.rs
// Per-topic circuit breaker. Generalized directly from
// `crates/mira-server/src/llm/circuit_breaker.rs`'s Closed/Open/HalfOpen
// state machine (there keyed by LLM `Provider`; here keyed by topic name),
// `parking_lot::Mutex` in place of std's per that file's dependency.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone)]
enum State {
    Closed { failures: Vec<Instant> },
    Open { tripped_at: Instant },
    HalfOpen,
}

impl Default for State {
    fn default() -> Self {
        Self::Closed { failures: Vec::new() }
    }
}

/// Thread-safe circuit breaker tracking per-topic health.
pub struct CircuitBreaker {
    states: Mutex<HashMap<String, State>>,
    failure_threshold: u32,
    failure_window: Duration,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, failure_window: Duration, cooldown: Duration) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            failure_threshold,
            failure_window,
            cooldown,
        }
    }

    pub fn is_available(&self, topic: &str) -> bool {
        let mut states = self.states.lock();
        let state = states.entry(topic.to_string()).or_default();

        match state {
            State::Closed { .. } => true,
            State::Open { tripped_at } => {
                if tripped_at.elapsed() >= self.cooldown {
                    info!(topic, "circuit half-open, allowing probe dispatch");
                    *state = State::HalfOpen;
                    true
                } else {
                    false
                }
            }
            State::HalfOpen => false,
        }
    }

    pub fn record_success(&self, topic: &str) {
        let mut states = self.states.lock();
        let state = states.entry(topic.to_string()).or_default();
        let was_half_open = matches!(state, State::HalfOpen);
        *state = State::Closed { failures: Vec::new() };
        if was_half_open {
            info!(topic, "circuit recovered");
        }
    }

    pub fn record_failure(&self, topic: &str) {
        let mut states = self.states.lock();
        let state = states.entry(topic.to_string()).or_default();
        let now = Instant::now();

        match state {
            State::Closed { failures } => {
                failures.push(now);
                failures.retain(|t| now.duration_since(*t) < self.failure_window);
                if failures.len() as u32 >= self.failure_threshold {
                    warn!(topic, failures = failures.len(), "circuit tripped");
                    *state = State::Open { tripped_at: now };
                }
            }
            State::HalfOpen => {
                warn!(topic, "half-open probe failed, re-tripping");
                *state = State::Open { tripped_at: now };
            }
            State::Open { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_after_threshold_failures() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(60), Duration::from_secs(30));
        assert!(cb.is_available("t"));
        cb.record_failure("t");
        cb.record_failure("t");
        assert!(cb.is_available("t"));
        cb.record_failure("t");
        assert!(!cb.is_available("t"));
    }

    #[test]
    fn independent_per_topic() {
        let cb = CircuitBreaker::new(1, Duration::from_secs(60), Duration::from_secs(30));
        cb.record_failure("a");
        assert!(!cb.is_available("a"));
        assert!(cb.is_available("b"));
    }

    #[test]
    fn success_resets_failure_count() {
        let cb = CircuitBreaker::new(2, Duration::from_secs(60), Duration::from_secs(30));
        cb.record_failure("t");
        cb.record_success("t");
        cb.record_failure("t");
        assert!(cb.is_available("t"));
    }
}
