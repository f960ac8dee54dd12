//! Session Wiring
//!
//! The single composition root: every shared service (generator,
//! embedder, stores) is constructed once here and handed down into the
//! pipeline and query flow as an injected dependency. Nothing ambient.

use std::sync::Arc;

use tracing::warn;

use crate::ai::{
    GeneratorConfig, OllamaEmbedder, ResilientGenerator, RetryPolicy, SharedEmbedder,
    create_generator,
};
use crate::config::Config;
use crate::graph::{GraphBuilder, TripleExtractor};
use crate::ingest::{
    ChunkMerger, IngestPipeline, JsonBlockSource, TierClassifier, TieredVerifier,
};
use crate::pool::WorkerPool;
use crate::query::{ContextAnalyzer, QueryFlow, QueryRouter, ResponseAuditor, Retriever};
use crate::storage::{
    DocumentStore, InMemoryGraphStore, InMemoryVectorStore, SharedGraphStore, SharedVectorStore,
};
use crate::types::Result;

/// One process-wide set of wired components.
pub struct Session {
    pub pipeline: IngestPipeline,
    pub flow: QueryFlow,
    pub graph_store: SharedGraphStore,
    pub documents: Arc<DocumentStore>,
}

impl Session {
    /// Build a session from configuration with the in-memory reference
    /// stores and the SQLite document registry.
    pub fn build(config: &Config) -> Result<Self> {
        let generator = ResilientGenerator::new(
            create_generator(&GeneratorConfig::from(&config.llm))?,
            RetryPolicy::default(),
        );

        let embedder: Option<SharedEmbedder> = if config.embedding.enabled {
            match OllamaEmbedder::new(&config.embedding) {
                Ok(embedder) => Some(Arc::new(embedder)),
                Err(e) => {
                    warn!("Embedder unavailable, continuing without embeddings: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let vector_store: SharedVectorStore = Arc::new(InMemoryVectorStore::new());
        let graph_store: SharedGraphStore = Arc::new(InMemoryGraphStore::new());
        let documents = Arc::new(DocumentStore::open(&config.storage.registry_path)?);

        // One pool bounds concurrent external calls across every fan-out
        let pool = WorkerPool::new(config.ingest.workers);

        let pipeline = IngestPipeline::new(
            Arc::new(JsonBlockSource::new()),
            ChunkMerger::new(
                &config.ingest,
                TierClassifier::new(&config.tiers),
                embedder.clone(),
            ),
            TieredVerifier::new(generator.clone(), pool.clone(), config.ingest.red_policy),
            GraphBuilder::new(
                TripleExtractor::new(generator.clone()),
                graph_store.clone(),
                pool.clone(),
            ),
            vector_store.clone(),
            graph_store.clone(),
            embedder.clone(),
            documents.clone(),
        );

        let flow = QueryFlow::new(
            QueryRouter::new(generator.clone(), config.retrieval.clone()),
            Retriever::new(vector_store, graph_store.clone(), embedder, pool),
            ContextAnalyzer::new(generator.clone()),
            ResponseAuditor::new(generator),
        );

        Ok(Self {
            pipeline,
            flow,
            graph_store,
            documents,
        })
    }
}
