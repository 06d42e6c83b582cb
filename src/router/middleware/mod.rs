//! The router's middleware chain, outermost first:
//! tracing/correlation-id propagation, throttle, recoverer, poison queue,
//! retry. Each piece is independently testable and composed by
//! [`super::TaskRouter`].

pub mod circuit_breaker;
pub mod poison;
pub mod recoverer;
pub mod retry;
pub mod throttle;

pub use circuit_breaker::CircuitBreaker;
pub use poison::PoisonPublisher;
pub use recoverer::recover;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use throttle::GlobalThrottle;
