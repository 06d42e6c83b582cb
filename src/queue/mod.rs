//! Durable Queue (C3): a topic-partitioned, at-least-once SQL-backed
//! publish/subscribe queue. Topics are physical per-topic log tables,
//! auto-initialized on first publish/subscribe.

pub mod store;
pub mod topics;

pub use store::DurableQueue;
pub use topics::Topic;
