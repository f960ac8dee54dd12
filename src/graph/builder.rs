//! Knowledge Graph Builder
//!
//! One extraction+persist task per verified chunk, fanned out over the
//! bounded worker pool. A chunk's task does its own LLM call and its own
//! store writes, so a failure stays confined to that chunk. Triples are
//! deduplicated by exact key before writing, and every triple endpoint is
//! linked to a provenance block node keyed by a content hash - repeated
//! ingestion of identical content lands on the same node.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::extractor::TripleExtractor;
use crate::pool::SharedPool;
use crate::storage::{GraphStore, SharedGraphStore};
use crate::types::{Result, Triple, VerifiedChunk};

/// Per-document build statistics.
#[derive(Debug, Clone, Default)]
pub struct GraphBuildStats {
    pub total_chunks: usize,
    pub processed_chunks: usize,
    pub entities_created: usize,
    pub relations_created: usize,
}

pub struct GraphBuilder {
    extractor: Arc<TripleExtractor>,
    store: SharedGraphStore,
    pool: SharedPool,
}

impl GraphBuilder {
    pub fn new(extractor: TripleExtractor, store: SharedGraphStore, pool: SharedPool) -> Self {
        Self {
            extractor: Arc::new(extractor),
            store,
            pool,
        }
    }

    /// Extract and persist the knowledge graph for one document's chunks.
    pub async fn build_from_chunks(
        &self,
        chunks: &[VerifiedChunk],
        file_name: &str,
    ) -> GraphBuildStats {
        let mut stats = GraphBuildStats {
            total_chunks: chunks.len(),
            ..Default::default()
        };

        let mut stream = futures::stream::iter(
            chunks
                .iter()
                .filter(|chunk| !chunk.verified_content.is_empty()),
        )
        .map(|chunk| {
            let extractor = Arc::clone(&self.extractor);
            let store = Arc::clone(&self.store);
            let pool = Arc::clone(&self.pool);
            let file_name = file_name.to_string();
            async move {
                pool.run(persist_chunk(&extractor, &store, chunk, &file_name))
                    .await
            }
        })
        .buffer_unordered(self.pool.size());

        while let Some(outcome) = stream.next().await {
            match outcome {
                Ok((entities, relations)) => {
                    stats.processed_chunks += 1;
                    stats.entities_created += entities;
                    stats.relations_created += relations;
                }
                Err(e) => {
                    // Isolated: one chunk's failure never aborts the batch
                    warn!("Graph extraction failed for a chunk: {}", e);
                }
            }
        }

        info!(
            file_name,
            processed = stats.processed_chunks,
            total = stats.total_chunks,
            entities = stats.entities_created,
            relations = stats.relations_created,
            "Knowledge graph build complete"
        );
        stats
    }
}

/// Extract one chunk's triples and write them with provenance.
/// Returns (unique entities, relations written).
async fn persist_chunk(
    extractor: &TripleExtractor,
    store: &SharedGraphStore,
    chunk: &VerifiedChunk,
    file_name: &str,
) -> Result<(usize, usize)> {
    let triples = extractor
        .extract(&chunk.verified_content, chunk.chunk.tier)
        .await;
    if triples.is_empty() {
        return Ok((0, 0));
    }

    // Dedup by exact triple key before any store traffic
    let mut seen = HashSet::new();
    let triples: Vec<Triple> = triples
        .into_iter()
        .filter(|t| seen.insert(t.key()))
        .collect();

    let block_id = block_id_for(&chunk.verified_content);
    store
        .upsert_block(
            &block_id,
            file_name,
            chunk.chunk.page,
            &chunk.verified_content,
            chunk.chunk.kind.as_str(),
        )
        .await?;

    let mut entities = HashSet::new();
    for triple in &triples {
        store.upsert_relation(triple).await?;
        store.link_mention(&triple.source, &block_id).await?;
        store.link_mention(&triple.target, &block_id).await?;
        entities.insert(triple.source.clone());
        entities.insert(triple.target.clone());
    }

    Ok((entities.len(), triples.len()))
}

/// Deterministic provenance id: identical content always maps to the same
/// block node.
pub fn block_id_for(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    format!("block_{}", hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{GenerationOptions, Generator, ResilientGenerator, RetryPolicy};
    use crate::storage::{GraphStore, InMemoryGraphStore};
    use crate::types::{BBox, BlockKind, MergedChunk, Tier};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Returns the same two triples (one duplicated) for every chunk.
    struct FixedExtraction;

    #[async_trait]
    impl Generator for FixedExtraction {
        async fn generate_text(
            &self,
            prompt: &str,
            _opts: GenerationOptions,
        ) -> crate::types::Result<String> {
            if prompt.contains("empty-chunk") {
                return Ok(String::new());
            }
            Ok("NLDMOS, Has_property, Breakdown Voltage\n\
                NLDMOS, Has_property, Breakdown Voltage\n\
                Breakdown Voltage, Has_property, 60V"
                .to_string())
        }

        async fn generate_multimodal(
            &self,
            _prompt: &str,
            _image: &str,
        ) -> crate::types::Result<String> {
            Ok(String::new())
        }

        fn name(&self) -> &str {
            "fixed"
        }

        async fn health_check(&self) -> crate::types::Result<bool> {
            Ok(true)
        }
    }

    fn verified(content: &str) -> VerifiedChunk {
        VerifiedChunk::verified(
            MergedChunk {
                kind: BlockKind::Text,
                page: 1,
                content: content.to_string(),
                tier: Tier::Red,
                coordinates: BBox::default(),
            },
            content.to_string(),
        )
    }

    fn builder(store: SharedGraphStore) -> GraphBuilder {
        let generator = ResilientGenerator::new(
            Arc::new(FixedExtraction),
            RetryPolicy {
                max_attempts: 1,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                backoff_factor: 1.0,
            },
        );
        GraphBuilder::new(
            TripleExtractor::new(generator),
            store,
            crate::pool::WorkerPool::new(4),
        )
    }

    #[tokio::test]
    async fn test_build_persists_deduped_triples_with_provenance() {
        let store = Arc::new(InMemoryGraphStore::new());
        let stats = builder(store.clone())
            .build_from_chunks(&[verified("Breakdown Voltage = 60V")], "spec.pdf")
            .await;

        assert_eq!(stats.processed_chunks, 1);
        // Duplicate extraction line collapsed to 2 relations, 3 entities
        assert_eq!(stats.relations_created, 2);
        assert_eq!(stats.entities_created, 3);

        let relations = store.search_relations("NLDMOS", None).await.unwrap();
        // Has_property edge plus MENTIONED_IN provenance edge
        assert_eq!(relations.len(), 2);
        assert!(relations.iter().any(|r| r.relation == "Has_property"));
        assert!(
            relations
                .iter()
                .any(|r| r.relation == "MENTIONED_IN" && r.target.starts_with("block_"))
        );
    }

    #[tokio::test]
    async fn test_reingestion_is_idempotent() {
        let store = Arc::new(InMemoryGraphStore::new());
        let chunks = [verified("Breakdown Voltage = 60V")];
        let b = builder(store.clone());
        b.build_from_chunks(&chunks, "spec.pdf").await;
        let before = store.relation_count();
        b.build_from_chunks(&chunks, "spec.pdf").await;
        assert_eq!(store.relation_count(), before);
    }

    #[tokio::test]
    async fn test_chunks_without_extractions_are_skipped() {
        let store = Arc::new(InMemoryGraphStore::new());
        let stats = builder(store.clone())
            .build_from_chunks(&[verified("empty-chunk")], "spec.pdf")
            .await;
        assert_eq!(stats.relations_created, 0);
        assert_eq!(store.relation_count(), 0);
    }

    #[test]
    fn test_block_id_is_stable() {
        assert_eq!(block_id_for("same"), block_id_for("same"));
        assert_ne!(block_id_for("a"), block_id_for("b"));
        assert!(block_id_for("x").starts_with("block_"));
    }
}
