// src/config/router.rs
// Task router / queue tuning knobs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::helpers::env_parsed;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub poll_interval_ms: u64,
}

impl QueueConfig {
    pub fn from_env() -> Self {
        Self {
            poll_interval_ms: env_parsed("MEMORIA_QUEUE_POLL_INTERVAL_MS", 500),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Global throttle across the whole router, messages/second.
    pub throttle_per_second: u32,
    pub retry_max_attempts: u32,
    pub retry_initial_interval_ms: u64,
    pub retry_multiplier: f64,
    pub retry_max_interval_ms: u64,
    pub retry_randomization_factor: f64,
    pub handler_timeout_secs: u64,
    pub circuit_failure_threshold: u32,
    pub circuit_failure_window_secs: u64,
    pub circuit_cooldown_secs: u64,
}

impl RouterConfig {
    pub fn from_env() -> Self {
        Self {
            throttle_per_second: env_parsed("MEMORIA_ROUTER_THROTTLE_PER_SECOND", 250),
            retry_max_attempts: env_parsed("MEMORIA_ROUTER_RETRY_MAX_ATTEMPTS", 5),
            retry_initial_interval_ms: env_parsed("MEMORIA_ROUTER_RETRY_INITIAL_MS", 1_000),
            retry_multiplier: env_parsed("MEMORIA_ROUTER_RETRY_MULTIPLIER", 1.5),
            retry_max_interval_ms: env_parsed("MEMORIA_ROUTER_RETRY_MAX_MS", 5_000),
            retry_randomization_factor: env_parsed("MEMORIA_ROUTER_RETRY_RANDOMIZATION", 0.5),
            handler_timeout_secs: env_parsed("MEMORIA_ROUTER_HANDLER_TIMEOUT_SECS", 60),
            circuit_failure_threshold: env_parsed("MEMORIA_ROUTER_CIRCUIT_FAILURE_THRESHOLD", 3),
            circuit_failure_window_secs: env_parsed(
                "MEMORIA_ROUTER_CIRCUIT_FAILURE_WINDOW_SECS",
                300,
            ),
            circuit_cooldown_secs: env_parsed("MEMORIA_ROUTER_CIRCUIT_COOLDOWN_SECS", 120),
        }
    }
}
