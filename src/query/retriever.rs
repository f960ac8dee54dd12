//! Multi-Modal Concurrent Retriever
//!
//! Fans out to every retrieval method enabled by the strategy: exact
//! match, vector similarity, graph traversal, and type-filtered table and
//! image searches. Methods run concurrently; a failing method degrades
//! retrieval completeness but never fails the overall call. Results are
//! deduplicated by `(content, file_name, page)` because the same content
//! can surface through more than one method.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::ai::{Embedder, SharedEmbedder};
use crate::config::{GraphParams, RetrievalStrategy};
use crate::constants::retrieval as consts;
use crate::pool::SharedPool;
use crate::storage::{GraphStore, SharedGraphStore, SharedVectorStore, VectorStore};
use crate::types::{BBox, ContextMetadata, Result, RetrievedContext, Tier, Triple};

pub struct Retriever {
    vector_store: SharedVectorStore,
    graph_store: SharedGraphStore,
    embedder: Option<SharedEmbedder>,
    pool: SharedPool,
}

impl Retriever {
    pub fn new(
        vector_store: SharedVectorStore,
        graph_store: SharedGraphStore,
        embedder: Option<SharedEmbedder>,
        pool: SharedPool,
    ) -> Self {
        Self {
            vector_store,
            graph_store,
            embedder,
            pool,
        }
    }

    /// Run every enabled method concurrently and join the results.
    pub async fn retrieve(
        &self,
        query: &str,
        strategy: &RetrievalStrategy,
        keywords: &[String],
    ) -> Vec<RetrievedContext> {
        // One query embedding shared by all vector-backed methods; if it
        // cannot be produced those methods degrade to empty results
        let query_vector = self.embed_query(query).await;

        let (exact, vector, graph, tables, images) = futures::join!(
            self.pool
                .run(self.run_exact(query, strategy, query_vector.as_deref())),
            self.pool.run(self.run_vector(strategy, query_vector.as_deref())),
            self.pool
                .run(self.run_graph(strategy.graph_search.as_ref(), query, keywords)),
            self.pool
                .run(self.run_kind_filtered(strategy.tables, query_vector.as_deref(), "table")),
            self.pool
                .run(self.run_kind_filtered(strategy.images, query_vector.as_deref(), "image")),
        );

        let mut contexts = Vec::new();
        for (method, outcome) in [
            ("exact_match", exact),
            ("vector_search", vector),
            ("graph_search", graph),
            ("table_search", tables),
            ("image_search", images),
        ] {
            match outcome {
                Ok(hits) => {
                    if !hits.is_empty() {
                        debug!(method, hits = hits.len(), "Retrieval method returned results");
                    }
                    contexts.extend(hits);
                }
                Err(e) => warn!(method, "Retrieval method failed: {}", e),
            }
        }

        let raw = contexts.len();
        let mut seen = HashSet::new();
        contexts.retain(|ctx| seen.insert(ctx.dedup_key()));
        info!(
            raw,
            unique = contexts.len(),
            "Retrieval fan-out complete"
        );
        contexts
    }

    async fn embed_query(&self, query: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(query).await {
            Ok(vector) if !vector.is_empty() => Some(vector),
            Ok(_) => None,
            Err(e) => {
                warn!("Query embedding failed, vector methods degraded: {}", e);
                None
            }
        }
    }

    async fn run_exact(
        &self,
        query: &str,
        strategy: &RetrievalStrategy,
        vector: Option<&[f32]>,
    ) -> Result<Vec<RetrievedContext>> {
        let (Some(limits), Some(vector)) = (strategy.exact_match, vector) else {
            return Ok(Vec::new());
        };
        self.vector_store
            .text_match(query, vector, limits.limit)
            .await
    }

    async fn run_vector(
        &self,
        strategy: &RetrievalStrategy,
        vector: Option<&[f32]>,
    ) -> Result<Vec<RetrievedContext>> {
        let (Some(limits), Some(vector)) = (strategy.vector_search, vector) else {
            return Ok(Vec::new());
        };
        self.vector_store
            .search(vector, limits.limit, limits.threshold, None)
            .await
    }

    async fn run_kind_filtered(
        &self,
        limits: Option<crate::config::MethodLimits>,
        vector: Option<&[f32]>,
        kind: &str,
    ) -> Result<Vec<RetrievedContext>> {
        let (Some(limits), Some(vector)) = (limits, vector) else {
            return Ok(Vec::new());
        };
        self.vector_store
            .search(vector, limits.limit, None, Some(kind))
            .await
    }

    /// Graph search over the extracted keywords (or naive fallback terms).
    /// With no terms at all the method is skipped - that is not an error.
    async fn run_graph(
        &self,
        params: Option<&GraphParams>,
        query: &str,
        keywords: &[String],
    ) -> Result<Vec<RetrievedContext>> {
        let Some(params) = params else {
            return Ok(Vec::new());
        };

        let terms: Vec<String> = if keywords.is_empty() {
            query
                .split_whitespace()
                .filter(|w| w.len() > 1)
                .take(consts::GRAPH_FALLBACK_TERMS)
                .map(|w| w.to_string())
                .collect()
        } else {
            keywords.to_vec()
        };

        if terms.is_empty() {
            debug!("No keywords available, skipping graph search");
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let mut relations: Vec<Triple> = Vec::new();
        for term in &terms {
            for relation in self.graph_store.search_relations(term, None).await? {
                if seen.insert(relation.key()) {
                    relations.push(relation);
                }
            }
        }

        if relations.is_empty() {
            return Ok(Vec::new());
        }
        debug!(relations = relations.len(), "Graph search found relations");

        // One synthetic high-confidence context summarizing the subgraph
        let mut content = format!(
            "Knowledge-graph relations related to '{}':\n\n",
            terms.join(", ")
        );
        for relation in relations.iter().take(params.relation_cap) {
            content.push_str(&format!("- {}\n", relation));
        }

        Ok(vec![RetrievedContext {
            score: 1.0,
            id: "graph_data_1".to_string(),
            metadata: ContextMetadata {
                file_name: "graph_database".to_string(),
                page: 1,
                kind: "graph_data".to_string(),
                tier: Tier::Red,
                coordinates: BBox::default(),
                content,
                image_base64: None,
            },
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::Embedder;
    use crate::config::{MethodLimits, RetrievalConfig};
    use crate::storage::{GraphStore, InMemoryGraphStore, InMemoryVectorStore, VectorStore};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct UnitEmbedder;

    #[async_trait]
    impl Embedder for UnitEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.is_empty() {
                return Ok(Vec::new());
            }
            Ok(vec![1.0, 0.0])
        }

        fn name(&self) -> &str {
            "unit"
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(crate::types::WaferError::Embedding("down".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn meta(content: &str, kind: &str) -> ContextMetadata {
        ContextMetadata {
            file_name: "spec.pdf".to_string(),
            page: 1,
            kind: kind.to_string(),
            tier: Tier::Green,
            coordinates: BBox::default(),
            content: content.to_string(),
            image_base64: None,
        }
    }

    async fn populated_stores() -> (Arc<InMemoryVectorStore>, Arc<InMemoryGraphStore>) {
        let vector = Arc::new(InMemoryVectorStore::new());
        vector
            .upsert("1", vec![1.0, 0.0], meta("Breakdown Voltage = 60V", "text"))
            .await
            .unwrap();
        vector
            .upsert("2", vec![1.0, 0.1], meta("Vth table", "table"))
            .await
            .unwrap();
        vector
            .upsert("3", vec![0.9, 0.1], meta("cross-section", "image"))
            .await
            .unwrap();

        let graph = Arc::new(InMemoryGraphStore::new());
        graph
            .upsert_relation(&Triple::new("NLDMOS", "Has_property", "Breakdown Voltage").unwrap())
            .await
            .unwrap();
        (vector, graph)
    }

    fn retriever(
        vector: Arc<InMemoryVectorStore>,
        graph: Arc<InMemoryGraphStore>,
        embedder: Option<SharedEmbedder>,
    ) -> Retriever {
        Retriever::new(vector, graph, embedder, crate::pool::WorkerPool::new(5))
    }

    #[tokio::test]
    async fn test_factual_strategy_runs_enabled_methods() {
        let (vector, graph) = populated_stores().await;
        let r = retriever(vector, graph, Some(Arc::new(UnitEmbedder)));

        let contexts = r
            .retrieve(
                "Breakdown Voltage of NLDMOS",
                &RetrievalConfig::default().factual,
                &[],
            )
            .await;

        assert!(!contexts.is_empty());
        // Table and image hits present via type-filtered searches
        assert!(contexts.iter().any(|c| c.metadata.kind == "table"));
        assert!(contexts.iter().any(|c| c.metadata.kind == "image"));
    }

    #[tokio::test]
    async fn test_duplicate_hits_across_methods_collapse() {
        let (vector, graph) = populated_stores().await;
        let r = retriever(vector, graph, Some(Arc::new(UnitEmbedder)));

        // exact_match and vector_search will both surface the same point
        let strategy = RetrievalStrategy {
            exact_match: Some(MethodLimits::limit(5)),
            vector_search: Some(MethodLimits::limit(5)),
            ..Default::default()
        };
        let contexts = r.retrieve("Breakdown Voltage", &strategy, &[]).await;

        let keys: Vec<_> = contexts.iter().map(|c| c.dedup_key()).collect();
        let unique: HashSet<_> = keys.iter().cloned().collect();
        assert_eq!(keys.len(), unique.len());
    }

    #[tokio::test]
    async fn test_graph_search_builds_synthetic_red_context() {
        let (vector, graph) = populated_stores().await;
        let r = retriever(vector, graph, Some(Arc::new(UnitEmbedder)));

        let strategy = RetrievalStrategy {
            graph_search: Some(GraphParams::default()),
            ..Default::default()
        };
        let contexts = r
            .retrieve("irrelevant", &strategy, &["NLDMOS".to_string()])
            .await;

        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].metadata.tier, Tier::Red);
        assert_eq!(contexts[0].metadata.kind, "graph_data");
        assert!(contexts[0].metadata.content.contains("NLDMOS Has_property Breakdown Voltage"));
    }

    #[tokio::test]
    async fn test_graph_search_skipped_without_terms() {
        let (vector, graph) = populated_stores().await;
        let r = retriever(vector, graph, Some(Arc::new(UnitEmbedder)));

        let strategy = RetrievalStrategy {
            graph_search: Some(GraphParams::default()),
            ..Default::default()
        };
        // Single-char words only: fallback tokenization yields nothing
        let contexts = r.retrieve("a b c", &strategy, &[]).await;
        assert!(contexts.is_empty());
    }

    #[tokio::test]
    async fn test_embedder_failure_degrades_not_fails() {
        let (vector, graph) = populated_stores().await;
        let r = retriever(vector, graph, Some(Arc::new(FailingEmbedder)));

        let contexts = r
            .retrieve(
                "Breakdown Voltage",
                &RetrievalConfig::default().factual,
                &["NLDMOS".to_string()],
            )
            .await;
        // Vector-backed methods degraded; overall retrieval still succeeds
        assert!(contexts.is_empty());
    }
}
