// src/enrichment/summary_ner.rs
// `message_summary_ner` handler: same shape as the message
// NER handler, keyed by summary UUID. The result **overwrites**
// `metadata.system.entities` rather than merging lists element-wise,
// matching the "write the whole list" behavior decided in DESIGN.md.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::{MemoriaError, MemoriaResult};
use crate::memory::types::TaskEnvelope;
use crate::memory::MemoryStore;
use crate::queue::Topic;
use crate::router::Task;

use super::summary_ref;

const NER_TIMEOUT: Duration = Duration::from_secs(10);
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Serialize)]
struct EntitiesRequest<'a> {
    items: Vec<EntitiesRequestItem<'a>>,
}

#[derive(Serialize)]
struct EntitiesRequestItem<'a> {
    uuid: uuid::Uuid,
    text: &'a str,
}

#[derive(Deserialize)]
struct EntitiesResponse {
    items: Vec<EntitiesResponseItem>,
}

#[derive(Deserialize)]
struct EntitiesResponseItem {
    entities: Vec<String>,
}

pub struct SummaryNerTask {
    store: Arc<dyn MemoryStore>,
    client: Client,
    server_url: String,
}

impl SummaryNerTask {
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
impl Task for SummaryNerTask {
    fn topic(&self) -> Topic {
        Topic::MessageSummaryNer
    }

    async fn execute(&self, envelope: &TaskEnvelope) -> MemoriaResult<()> {
        let (_session_id, uuid) = summary_ref(envelope)?;
        let summary = match self.store.get_summary_by_uuid(uuid).await {
            Ok(summary) => summary,
            Err(e) if e.is_not_found() => {
                debug!(%uuid, "summary gone before ner, acking");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let request = EntitiesRequest {
            items: vec![EntitiesRequestItem { uuid: summary.uuid, text: &summary.text }],
        };
        let response = self.call_with_retry(&request).await?;
        let entities = response.items.into_iter().next().map(|i| i.entities).unwrap_or_default();
        if entities.is_empty() {
            return Ok(());
        }

        match self
            .store
            .update_summary(summary.uuid, json!({"system": {"entities": entities}}))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_with_empty_entities_is_skippable() {
        let parsed: EntitiesResponse = serde_json::from_value(json!({
            "items": [{"entities": []}]
        }))
        .unwrap();
        let entities = parsed.items.into_iter().next().unwrap().entities;
        assert!(entities.is_empty());
    }
}
