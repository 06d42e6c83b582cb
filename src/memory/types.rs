// src/memory/types.rs
// Core entities of the data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

fn empty_metadata() -> Value {
    Value::Object(Map::new())
}

/// A conversation container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Stable opaque identifier, caller-supplied.
    pub session_id: String,
    /// Internal UUID, assigned on creation.
    pub uuid: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
    #[serde(default = "empty_metadata")]
    pub metadata: Value,
}

impl Session {
    pub fn new(session_id: impl Into<String>, user_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            uuid: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            user_id,
            metadata: empty_metadata(),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// An immutable utterance within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub uuid: Uuid,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub role: String,
    pub content: String,
    #[serde(default = "empty_metadata")]
    pub metadata: Value,
    /// Non-negative; zero means "not yet counted".
    pub token_count: i64,
}

impl Message {
    pub fn new(session_id: impl Into<String>, role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            session_id: session_id.into(),
            created_at: Utc::now(),
            role: role.into(),
            content: content.into(),
            metadata: empty_metadata(),
            token_count: 0,
        }
    }

    pub fn is_empty_content(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Formats the message the way every enrichment handler that sends
    /// content to an LLM expects it: `"{role}: {content}"`.
    pub fn as_prompt_line(&self) -> String {
        format!("{}: {}", self.role, self.content)
    }
}

/// A compressed view of a prefix of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub uuid: Uuid,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub text: String,
    /// UUID of the most recent message folded into this summary.
    pub summary_point: Uuid,
    pub token_count: i64,
    #[serde(default = "empty_metadata")]
    pub metadata: Value,
}

impl Summary {
    pub fn new(session_id: impl Into<String>, text: impl Into<String>, summary_point: Uuid) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            session_id: session_id.into(),
            created_at: Utc::now(),
            text: text.into(),
            summary_point,
            token_count: 0,
            metadata: empty_metadata(),
        }
    }
}

/// The owning entity a [`TextEmbedding`] is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingOwnerKind {
    Message,
    Summary,
    Document,
}

/// A vector attached to a message, summary, or document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextEmbedding {
    pub owner_kind: EmbeddingOwnerKind,
    pub owner_uuid: Uuid,
    pub text_snapshot: String,
    pub vector: Vec<f32>,
    pub model: String,
    pub language: Option<String>,
}

/// What flows through the durable queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    /// Stable message-id used for dedup/idempotency bookkeeping by callers.
    pub message_id: Uuid,
    /// Always includes `session_id` or `collection_name`; may include
    /// `correlation_id`.
    pub metadata: Value,
    pub payload: TaskPayload,
}

/// The three envelope payload shapes: one per fan-out pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TaskPayload {
    /// A list of message UUID references — handlers re-read authoritative
    /// content by UUID.
    MessageRefs { uuids: Vec<Uuid> },
    /// A summary UUID reference.
    SummaryRef { uuid: Uuid },
    /// Document UUID + content pairs for the document-embedding pipeline.
    Documents { items: Vec<DocumentRef> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRef {
    pub uuid: Uuid,
    pub content: String,
}

impl TaskEnvelope {
    pub fn for_messages(session_id: &str, uuids: Vec<Uuid>, correlation_id: Option<Uuid>) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            metadata: envelope_metadata(session_id, correlation_id),
            payload: TaskPayload::MessageRefs { uuids },
        }
    }

    pub fn for_summary(session_id: &str, uuid: Uuid, correlation_id: Option<Uuid>) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            metadata: envelope_metadata(session_id, correlation_id),
            payload: TaskPayload::SummaryRef { uuid },
        }
    }

    pub fn for_documents(
        collection_name: &str,
        items: Vec<DocumentRef>,
        correlation_id: Option<Uuid>,
    ) -> Self {
        let mut metadata = Map::new();
        metadata.insert("collection_name".to_string(), Value::String(collection_name.to_string()));
        if let Some(cid) = correlation_id {
            metadata.insert("correlation_id".to_string(), Value::String(cid.to_string()));
        }
        Self {
            message_id: Uuid::new_v4(),
            metadata: Value::Object(metadata),
            payload: TaskPayload::Documents { items },
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.metadata.get("session_id").and_then(Value::as_str)
    }

    pub fn collection_name(&self) -> Option<&str> {
        self.metadata.get("collection_name").and_then(Value::as_str)
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.metadata.get("correlation_id").and_then(Value::as_str)
    }
}

fn envelope_metadata(session_id: &str, correlation_id: Option<Uuid>) -> Value {
    let mut metadata = Map::new();
    metadata.insert("session_id".to_string(), Value::String(session_id.to_string()));
    if let Some(cid) = correlation_id {
        metadata.insert("correlation_id".to_string(), Value::String(cid.to_string()));
    }
    Value::Object(metadata)
}
