// src/summarizer/mod.rs
// Summarization Engine: sliding-window summarizer with
// incremental, token-budgeted folding. Grounded on
// `backend/src/memory/features/summarization/{mod.rs,
// strategies/rolling_summary.rs,storage.rs}`: a coordinating engine
// delegating to a content builder / prompt builder / LLM call, same
// "join `{role}: {content}` lines" idiom as `RollingSummaryStrategy::
// build_content`. The token-budgeted multi-pass fold loop is new — a
// single-pass rolling strategy doesn't hold under a token budget per
// call, so this one may invoke the LLM more than once.

pub mod prompts;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::llm::{CustomPrompts, LlmConfig, LlmFamily};
use crate::config::memory::MemoryConfig;
use crate::error::{MemoriaError, MemoriaResult};
use crate::llm::{LlmProvider, Message as LlmMessage};
use crate::memory::types::{Message, Summary, TaskEnvelope};
use crate::memory::MemoryStore;
use crate::publisher::TaskPublisher;
use crate::queue::Topic;
use crate::router::Task;

pub struct SummarizationEngine {
    store: Arc<dyn MemoryStore>,
    llm: Arc<dyn LlmProvider>,
    publisher: Arc<TaskPublisher>,
    memory_config: MemoryConfig,
    llm_config: LlmConfig,
    custom_prompts: CustomPrompts,
}

impl SummarizationEngine {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        llm: Arc<dyn LlmProvider>,
        publisher: Arc<TaskPublisher>,
        memory_config: MemoryConfig,
        llm_config: LlmConfig,
        custom_prompts: CustomPrompts,
    ) -> Self {
        Self {
            store,
            llm,
            publisher,
            memory_config,
            llm_config,
            custom_prompts,
        }
    }

    fn selected_template(&self) -> &str {
        match self.llm_config.service {
            LlmFamily::OpenAi => self
                .custom_prompts
                .summarizer_openai
                .as_deref()
                .unwrap_or_else(|| prompts::default_prompt(LlmFamily::OpenAi)),
            LlmFamily::Anthropic => self
                .custom_prompts
                .summarizer_anthropic
                .as_deref()
                .unwrap_or_else(|| prompts::default_prompt(LlmFamily::Anthropic)),
        }
    }

    async fn fold(&self, running_summary: &str, joined_messages: &str) -> MemoriaResult<crate::llm::Response> {
        let prompt = prompts::render(self.selected_template(), running_summary, joined_messages);
        self.llm.chat(vec![LlmMessage::user(prompt)], String::new()).await
    }

    /// Runs one summarization pass for `session_id` if the sliding window
    /// has enough unsummarized messages. Returns the new
    /// summary's UUID, or `None` if there was nothing to fold.
    pub async fn summarize(&self, session_id: &str, correlation_id: Option<Uuid>) -> MemoriaResult<Option<Uuid>> {
        if self.memory_config.message_window == 0 {
            return Err(MemoriaError::internal("message_window must be greater than zero"));
        }

        // Surfaces NotFound if the session was deleted during processing —
        // the caller treats that as a successfully handled no-op.
        self.store.get_session(session_id).await?;

        let memory = self.store.get_memory(session_id, 0).await?;
        let running_summary_seed = memory.summary.as_ref().map(|s| s.text.clone()).unwrap_or_default();
        let mut messages: Vec<Message> = memory
            .messages
            .into_iter()
            .filter(|m| !m.is_empty_content())
            .collect();

        let window = self.memory_config.message_window;
        if messages.len() < window {
            return Ok(None);
        }

        let keep_count = window / 2;
        let split_at = messages.len() - keep_count;
        let messages_to_summarize: Vec<Message> = messages.drain(..split_at).collect();

        let max_tokens = crate::llm::model_limits::max_tokens_for_model(&self.llm_config.model) as i64;
        let input_budget = max_tokens - 1_024 - 250;

        let mut running_summary = running_summary_seed;
        let mut accumulator = String::new();
        let mut last_response = None;

        for message in &messages_to_summarize {
            let line = message.as_prompt_line();
            let candidate = if accumulator.is_empty() {
                line.clone()
            } else {
                format!("{accumulator}\n{line}")
            };
            let candidate_tokens = self.llm.count_tokens(&candidate).await?;

            if candidate_tokens > input_budget && !accumulator.is_empty() {
                let response = self.fold(&running_summary, &accumulator).await?;
                running_summary = response.content.clone();
                last_response = Some(response);
                accumulator = line;
            } else {
                accumulator = candidate;
            }
        }
        if !accumulator.is_empty() {
            let response = self.fold(&running_summary, &accumulator).await?;
            running_summary = response.content.clone();
            last_response = Some(response);
        }

        let response = last_response
            .ok_or_else(|| MemoriaError::internal("summarizer produced no output for a non-empty window"))?;

        let summary_point = messages_to_summarize
            .last()
            .expect("split_at < messages.len() guarantees at least one element")
            .uuid;

        let mut new_summary = Summary::new(session_id, running_summary, summary_point);
        new_summary.token_count = response.tokens.output;
        let created = self.store.create_summary(session_id, &new_summary).await?;

        info!(session_id, summary_uuid = %created.uuid, "created new summary");
        self.publisher
            .publish_summary(session_id, created.uuid, correlation_id)
            .await?;

        Ok(Some(created.uuid))
    }
}

#[async_trait]
impl Task for SummarizationEngine {
    fn topic(&self) -> Topic {
        Topic::MessageSummarizer
    }

    async fn execute(&self, envelope: &TaskEnvelope) -> MemoriaResult<()> {
        let session_id = envelope
            .session_id()
            .ok_or_else(|| MemoriaError::bad_request("message_summarizer envelope missing session_id"))?;
        let correlation_id = envelope
            .correlation_id()
            .and_then(|c| Uuid::parse_str(c).ok());

        match self.summarize(session_id, correlation_id).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!(session_id, "session gone during summarization, treating as handled");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::llm::LlmFamily;
    use crate::llm::mock::MockLlmProvider;
    use crate::memory::sqlite::SqliteMemoryStore;
    use crate::memory::traits::MemoryBatch;
    use crate::queue::DurableQueue;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_engine(window: usize) -> (SummarizationEngine, Arc<dyn MemoryStore>) {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        let store: Arc<dyn MemoryStore> = Arc::new(SqliteMemoryStore::new(pool).await.unwrap());
        let queue_pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        let queue = Arc::new(DurableQueue::new(queue_pool));
        let publisher = Arc::new(TaskPublisher::new(
            queue,
            crate::config::memory::ExtractorsConfig {
                summarizer_enabled: true,
                summarizer_embeddings_enabled: true,
                summarizer_entities_enabled: true,
                embeddings_enabled: true,
                entities_enabled: true,
                intent_enabled: true,
                documents_embeddings_enabled: true,
                documents_embeddings_max_procs: 1,
                documents_embeddings_chunk_size: 1,
                documents_embeddings_buffer_size: 1,
                documents_embeddings_dimensions: 8,
            },
        ));
        let engine = SummarizationEngine::new(
            store.clone(),
            Arc::new(MockLlmProvider::default()),
            publisher,
            MemoryConfig {
                message_window: window,
                default_last_n: 6,
                max_messages_per_ingest: 30,
                max_content_len_standard: 2_500,
                max_content_len_elevated: 100_000,
            },
            LlmConfig {
                service: LlmFamily::OpenAi,
                model: "gpt-4o".to_string(),
            },
            CustomPrompts {
                summarizer_openai: None,
                summarizer_anthropic: None,
            },
        );
        (engine, store)
    }

    #[tokio::test]
    async fn below_window_is_a_no_op() {
        let (engine, store) = test_engine(10).await;
        let messages = (0..5).map(|i| Message::new("s1", "user", format!("m{i}"))).collect();
        store.put_memory("s1", MemoryBatch { messages }, true).await.unwrap();

        let result = engine.summarize("s1", None).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn at_window_creates_summary_with_correct_summary_point() {
        let (engine, store) = test_engine(10).await;
        let messages: Vec<Message> = (0..12).map(|i| Message::new("s1", "user", format!("m{i}"))).collect();
        let expected_point = messages[6].uuid;
        store.put_memory("s1", MemoryBatch { messages }, true).await.unwrap();

        let uuid = engine.summarize("s1", None).await.unwrap().expect("summary created");
        let summary = store.get_summary_by_uuid(uuid).await.unwrap();
        assert_eq!(summary.summary_point, expected_point);

        let memory = store.get_memory("s1", 0).await.unwrap();
        assert_eq!(memory.messages.len(), 5);
    }

    #[tokio::test]
    async fn deleted_session_is_treated_as_success() {
        let (engine, _store) = test_engine(10).await;
        let envelope = TaskEnvelope::for_messages("missing-session", vec![], None);
        let result = engine.execute(&envelope).await;
        assert!(result.is_ok());
    }
}
