// src/router/middleware/throttle.rs
// Global rate cap across the whole router (250 messages/second by default).
// Grounded on `backend/src/utils/rate_limiter.rs`'s `governor::RateLimiter` +
// `Jitter` wrapper, un-keyed since the cap is global rather than per-provider.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Jitter, Quota, RateLimiter};

use crate::error::{MemoriaError, MemoriaResult};

pub struct GlobalThrottle {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    jitter: Jitter,
}

impl GlobalThrottle {
    pub fn new(per_second: u32) -> MemoriaResult<Self> {
        let quota = Quota::per_second(
            NonZeroU32::new(per_second).ok_or_else(|| MemoriaError::fatal("throttle rate must be > 0"))?,
        );
        Ok(Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            jitter: Jitter::new(Duration::from_millis(1), Duration::from_millis(10)),
        })
    }

    /// Blocks until a dispatch slot is available.
    pub async fn acquire(&self) {
        self.limiter.until_ready_with_jitter(self.jitter).await;
    }
}
