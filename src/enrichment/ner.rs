// src/enrichment/ner.rs
// `message_ner` handler: POSTs message content to an
// external NLP service and merges back the entities it returns. Request
// shape grounded on `backend/src/llm/provider/openai/embeddings.rs`'s
// `reqwest::Client` + Serialize/Deserialize request/response idiom.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{MemoriaError, MemoriaResult};
use crate::memory::traits::MessageUpdate;
use crate::memory::types::TaskEnvelope;
use crate::memory::MemoryStore;
use crate::queue::Topic;
use crate::router::Task;

use super::message_refs;

const NER_TIMEOUT: Duration = Duration::from_secs(10);
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Serialize)]
struct EntitiesRequest<'a> {
    items: Vec<EntitiesRequestItem<'a>>,
}

#[derive(Serialize)]
struct EntitiesRequestItem<'a> {
    uuid: Uuid,
    text: &'a str,
}

#[derive(Deserialize)]
struct EntitiesResponse {
    items: Vec<EntitiesResponseItem>,
}

#[derive(Deserialize)]
struct EntitiesResponseItem {
    uuid: Uuid,
    entities: Vec<String>,
}

pub struct NerTask {
    store: Arc<dyn MemoryStore>,
    client: Client,
    server_url: String,
}

impl NerTask {
    pub fn new(store: Arc<dyn MemoryStore>, server_url: impl Into<String>) -> Self {
        Self {
            store,
            client: Client::new(),
            server_url: server_url.into(),
        }
    }

    async fn call_with_retry(&self, request: &EntitiesRequest<'_>) -> MemoriaResult<EntitiesResponse> {
        let url = format!("{}/entities", self.server_url.trim_end_matches('/'));
        let mut last_error = None;
        for attempt in 0..RETRY_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(RETRY_DELAY).await;
            }
            let call = self.client.post(&url).json(request).send();
            match tokio::time::timeout(NER_TIMEOUT, call).await {
                Ok(Ok(response)) => match response.error_for_status() {
                    Ok(response) => match response.json::<EntitiesResponse>().await {
                        Ok(parsed) => return Ok(parsed),
                        Err(e) => last_error = Some(e.to_string()),
                    },
                    Err(e) => last_error = Some(e.to_string()),
                },
                Ok(Err(e)) => last_error = Some(e.to_string()),
                Err(_) => last_error = Some("ner request timed out".to_string()),
            }
        }
        Err(MemoriaError::transient(format!(
            "ner service unreachable after {RETRY_ATTEMPTS} attempts: {}",
            last_error.unwrap_or_default()
        )))
    }
}

#[async_trait]
impl Task for NerTask {
    fn topic(&self) -> Topic {
        Topic::MessageNer
    }

    async fn execute(&self, envelope: &TaskEnvelope) -> MemoriaResult<()> {
        let (session_id, uuids) = message_refs(envelope)?;
        let messages = self.store.get_messages_by_uuid(session_id, uuids).await?;
        if messages.is_empty() {
            debug!(session_id, "messages gone before ner, acking");
            return Ok(());
        }

        let request = EntitiesRequest {
            items: messages
                .iter()
                .map(|m| EntitiesRequestItem { uuid: m.uuid, text: &m.content })
                .collect(),
        };
        let response = self.call_with_retry(&request).await?;

        let updates: Vec<MessageUpdate> = response
            .items
            .into_iter()
            .filter(|item| !item.entities.is_empty())
            .map(|item| {
                MessageUpdate::metadata_only(item.uuid, json!({"system": {"entities": item.entities}}))
            })
            .collect();
        if updates.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.store.update_messages(session_id, updates, true, false).await {
            if e.is_not_found() {
                warn!(session_id, "message deleted between ner call and write-back");
                return Ok(());
            }
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_uuid_and_text_pairs() {
        let uuid = Uuid::new_v4();
        let request = EntitiesRequest {
            items: vec![EntitiesRequestItem { uuid, text: "hello" }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["items"][0]["uuid"], json!(uuid));
        assert_eq!(value["items"][0]["text"], json!("hello"));
    }

    #[test]
    fn response_with_empty_entities_is_filterable() {
        let parsed: EntitiesResponse = serde_json::from_value(json!({
            "items": [
                {"uuid": Uuid::new_v4(), "entities": []},
                {"uuid": Uuid::new_v4(), "entities": ["Paris"]},
            ]
        }))
        .unwrap();
        let kept: Vec<_> = parsed.items.into_iter().filter(|i| !i.entities.is_empty()).collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].entities, vec!["Paris".to_string()]);
    }
}
