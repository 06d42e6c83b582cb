// src/bin/memoriad.rs
// memoriad - long-term conversational memory core daemon.
//
// Wires the Ingest Coordinator (C6), the Durable Queue (C3), the Task
// Router (C4) bound to every enrichment handler (C8) plus the
// Summarization Engine (C7), and runs until interrupted. Concrete LLM/
// embedding providers are out of scope — this binary wires
// the in-memory mock provider so the pipeline is runnable end-to-end
// without a network dependency; swapping in a real provider only touches
// this file.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use memoria_core::api::SessionApi;
use memoria_core::config::CONFIG;
use memoria_core::enrichment::{
    document_embedder::DocumentEmbedderTask, embedder::MessageEmbedderTask, intent::IntentTask,
    ner::NerTask, summary_embedder::SummaryEmbedderTask, summary_ner::SummaryNerTask,
    token_counter::TokenCounterTask,
};
use memoria_core::ingest::IngestCoordinator;
use memoria_core::llm::mock::MockLlmProvider;
use memoria_core::memory::sqlite::SqliteMemoryStore;
use memoria_core::memory::{DocumentStore, MemoryStore};
use memoria_core::publisher::TaskPublisher;
use memoria_core::queue::DurableQueue;
use memoria_core::router::TaskRouter;
use memoria_core::summarizer::SummarizationEngine;

/// Grace period the router waits for in-flight handlers to drain on
/// shutdown before aborting them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "memoriad")]
#[command(about = "Long-term conversational memory core: ingest, task routing, summarization")]
#[command(version)]
struct Args {
    /// SQLite URL for the memory store (sessions, messages, summaries, embeddings).
    #[arg(long, env = "MEMORIA_DATABASE_URL", default_value = "sqlite://memoria.db")]
    database_url: String,

    /// SQLite URL for the durable queue, kept on a separate pool.
    #[arg(long, env = "MEMORIA_QUEUE_DATABASE_URL", default_value = "sqlite://memoria_queue.db")]
    queue_database_url: String,

    /// Consumer group name this router instance subscribes as.
    #[arg(long, env = "MEMORIA_CONSUMER_GROUP", default_value = "memoriad")]
    consumer_group: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    CONFIG.validate()?;
    info!("starting memoriad");

    let store_pool = SqlitePoolOptions::new().connect(&args.database_url).await?;
    let store: Arc<dyn MemoryStore> = Arc::new(SqliteMemoryStore::new(store_pool).await?);
    let document_store: Arc<dyn DocumentStore> = {
        let pool = SqlitePoolOptions::new().connect(&args.database_url).await?;
        Arc::new(SqliteMemoryStore::new(pool).await?)
    };

    let queue_pool = SqlitePoolOptions::new().connect(&args.queue_database_url).await?;
    let queue = Arc::new(DurableQueue::new(queue_pool));

    let publisher = Arc::new(TaskPublisher::new(queue.clone(), CONFIG.extractors.clone()));
    let ingest = Arc::new(IngestCoordinator::new(store.clone(), publisher.clone(), CONFIG.memory.clone()));
    let _api = SessionApi::new(store.clone(), ingest, Arc::new(MockLlmProvider::default()));

    let llm = Arc::new(MockLlmProvider::default());
    let embedder = Arc::new(MockLlmProvider { dimension: CONFIG.extractors.documents_embeddings_dimensions });

    let mut router = TaskRouter::new(queue.clone(), &CONFIG.router, &CONFIG.queue, &args.consumer_group)?;

    router.bind(TokenCounterTask::new(store.clone(), llm.clone()));
    if CONFIG.extractors.embeddings_enabled {
        router.bind(MessageEmbedderTask::new(store.clone(), embedder.clone()));
    }
    if CONFIG.extractors.entities_enabled {
        router.bind(NerTask::new(store.clone(), CONFIG.nlp.server_url.clone()));
    }
    if CONFIG.extractors.intent_enabled {
        router.bind(IntentTask::new(store.clone(), llm.clone()));
    }
    if CONFIG.extractors.summarizer_embeddings_enabled {
        router.bind(SummaryEmbedderTask::new(store.clone(), embedder.clone()));
    }
    if CONFIG.extractors.summarizer_entities_enabled {
        router.bind(SummaryNerTask::new(store.clone(), CONFIG.nlp.server_url.clone()));
    }
    if CONFIG.extractors.documents_embeddings_enabled {
        router.bind(DocumentEmbedderTask::new(
            document_store,
            embedder.clone(),
            CONFIG.extractors.documents_embeddings_dimensions,
        ));
    }
    if CONFIG.extractors.summarizer_enabled {
        router.bind(SummarizationEngine::new(
            store,
            llm,
            publisher,
            CONFIG.memory.clone(),
            CONFIG.llm.clone(),
            CONFIG.custom_prompts.clone(),
        ));
    }

    info!("memoriad ready, subscribing as consumer group {}", args.consumer_group);
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining in-flight handlers");
    router.shutdown(SHUTDOWN_GRACE).await;
    info!("memoriad stopped");
    Ok(())
}
