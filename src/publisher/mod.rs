// src/publisher/mod.rs
// Fans one "new messages persisted" event out to the enrichment topics.
// Grounded on `backend/src/tasks/mod.rs`'s
// `TaskManager::start()` shape of "check a config flag, conditionally
// act" per topic, adapted from "spawn a scheduled job" to "publish an
// envelope".

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::config::memory::ExtractorsConfig;
use crate::error::MemoriaResult;
use crate::memory::types::{DocumentRef, TaskEnvelope};
use crate::queue::{DurableQueue, Topic};

/// Publishes fan-out envelopes for ingested messages, summaries, and
/// documents. Holds its own view of which extractors are enabled so
/// callers don't need to thread config through every call site.
pub struct TaskPublisher {
    queue: Arc<DurableQueue>,
    extractors: ExtractorsConfig,
}

impl TaskPublisher {
    pub fn new(queue: Arc<DurableQueue>, extractors: ExtractorsConfig) -> Self {
        Self { queue, extractors }
    }

    /// One logical "new messages persisted" event, fanned to every topic
    /// enabled in config. `message_token_count` always fires; the rest are
    /// config-gated. Payload carries UUIDs only — handlers re-read content
    /// by UUID.
    pub async fn publish_message(
        &self,
        session_id: &str,
        uuids: Vec<Uuid>,
        correlation_id: Option<Uuid>,
    ) -> MemoriaResult<()> {
        self.queue
            .publish(
                Topic::MessageTokenCount.as_str(),
                &TaskEnvelope::for_messages(session_id, uuids.clone(), correlation_id),
            )
            .await?;

        if self.extractors.embeddings_enabled {
            self.queue
                .publish(
                    Topic::MessageEmbedder.as_str(),
                    &TaskEnvelope::for_messages(session_id, uuids.clone(), correlation_id),
                )
                .await?;
        }
        if self.extractors.summarizer_enabled {
            self.queue
                .publish(
                    Topic::MessageSummarizer.as_str(),
                    &TaskEnvelope::for_messages(session_id, uuids.clone(), correlation_id),
                )
                .await?;
        }
        if self.extractors.entities_enabled {
            self.queue
                .publish(
                    Topic::MessageNer.as_str(),
                    &TaskEnvelope::for_messages(session_id, uuids.clone(), correlation_id),
                )
                .await?;
        }
        if self.extractors.intent_enabled {
            self.queue
                .publish(
                    Topic::MessageIntent.as_str(),
                    &TaskEnvelope::for_messages(session_id, uuids, correlation_id),
                )
                .await?;
        }

        debug!(session_id, "fanned out message enrichment events");
        Ok(())
    }

    /// Triggered by the summarizer itself after it writes a new summary,
    /// keyed by summary UUID.
    pub async fn publish_summary(
        &self,
        session_id: &str,
        summary_uuid: Uuid,
        correlation_id: Option<Uuid>,
    ) -> MemoriaResult<()> {
        if self.extractors.summarizer_embeddings_enabled {
            self.queue
                .publish(
                    Topic::MessageSummaryEmbedder.as_str(),
                    &TaskEnvelope::for_summary(session_id, summary_uuid, correlation_id),
                )
                .await?;
        }
        if self.extractors.summarizer_entities_enabled {
            self.queue
                .publish(
                    Topic::MessageSummaryNer.as_str(),
                    &TaskEnvelope::for_summary(session_id, summary_uuid, correlation_id),
                )
                .await?;
        }
        Ok(())
    }

    /// Separate pipeline keyed by `collection_name`.
    pub async fn publish_documents(
        &self,
        collection_name: &str,
        items: Vec<DocumentRef>,
        correlation_id: Option<Uuid>,
    ) -> MemoriaResult<()> {
        if !self.extractors.documents_embeddings_enabled {
            return Ok(());
        }
        self.queue
            .publish(
                Topic::DocumentEmbedder.as_str(),
                &TaskEnvelope::for_documents(collection_name, items, correlation_id),
            )
            .await
            .map(|_| ())
    }
}
