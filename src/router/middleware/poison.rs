// src/router/middleware/poison.rs
// After the retry budget is exhausted, republish the envelope to the
// `poison_queue` topic and ack it on its origin topic.
// Grounded on the "republish to a dedicated topic" idiom already used by
// `queue::store::DurableQueue::publish`.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::error;

use crate::error::MemoriaResult;
use crate::memory::types::{TaskEnvelope, TaskPayload};
use crate::queue::{DurableQueue, Topic};

pub struct PoisonPublisher {
    queue: Arc<DurableQueue>,
}

impl PoisonPublisher {
    pub fn new(queue: Arc<DurableQueue>) -> Self {
        Self { queue }
    }

    /// Wraps `envelope` with its origin topic recorded in metadata and
    /// republishes it to `poison_queue`. A failure here is logged and
    /// swallowed — the poison topic is a terminal sink; the behavior of a
    /// second failure here is deliberately left unspecified (see DESIGN.md's
    /// Open Question resolution), so this crate treats it as "ack origin and
    /// drop" rather than risk looping the poison handler forever.
    pub async fn poison(&self, origin_topic: &str, envelope: &TaskEnvelope) {
        let mut metadata = match &envelope.metadata {
            Value::Object(m) => m.clone(),
            _ => Map::new(),
        };
        metadata.insert("origin_topic".to_string(), Value::String(origin_topic.to_string()));

        let poisoned = TaskEnvelope {
            message_id: envelope.message_id,
            metadata: Value::Object(metadata),
            payload: clone_payload(&envelope.payload),
        };

        if let Err(e) = self.queue.publish(Topic::PoisonQueue.as_str(), &poisoned).await {
            error!(origin_topic, error = %e, "failed to publish to poison_queue; dropping envelope");
        }
    }
}

fn clone_payload(payload: &TaskPayload) -> TaskPayload {
    match payload {
        TaskPayload::MessageRefs { uuids } => TaskPayload::MessageRefs { uuids: uuids.clone() },
        TaskPayload::SummaryRef { uuid } => TaskPayload::SummaryRef { uuid: *uuid },
        TaskPayload::Documents { items } => TaskPayload::Documents { items: items.clone() },
    }
}

pub type PoisonResult = MemoriaResult<()>;
