//! Document Ingestion Pipeline
//!
//! `process_document` is the ingestion entrypoint: hash-based dedup,
//! parse, merge, tiered verification, graph build, vector indexing,
//! registry insert. A shared cancellation flag is checked between phases;
//! cancellation or a hard failure after parsing rolls back every partial
//! write for the document before the error propagates.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use super::adapter::BlockSource;
use super::merger::ChunkMerger;
use super::verifier::TieredVerifier;
use super::{CancelFlag, ProgressCallback};
use crate::ai::{Embedder, SharedEmbedder};
use crate::graph::{GraphBuildStats, GraphBuilder};
use crate::storage::{
    DocumentRecord, DocumentStore, GraphStore, SharedGraphStore, SharedVectorStore, VectorStore,
};
use crate::types::{BlockKind, ContextMetadata, Result, VerifiedChunk};

/// Outcome of one ingestion call.
#[derive(Debug)]
pub enum IngestOutcome {
    /// Identical bytes were ingested before; nothing was done.
    AlreadyIngested,
    /// Document processed end to end.
    Ingested {
        chunks: Vec<VerifiedChunk>,
        graph: GraphBuildStats,
    },
}

pub struct IngestPipeline {
    source: Arc<dyn BlockSource>,
    merger: ChunkMerger,
    verifier: TieredVerifier,
    graph_builder: GraphBuilder,
    vector_store: SharedVectorStore,
    graph_store: SharedGraphStore,
    embedder: Option<SharedEmbedder>,
    documents: Arc<DocumentStore>,
}

impl IngestPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn BlockSource>,
        merger: ChunkMerger,
        verifier: TieredVerifier,
        graph_builder: GraphBuilder,
        vector_store: SharedVectorStore,
        graph_store: SharedGraphStore,
        embedder: Option<SharedEmbedder>,
        documents: Arc<DocumentStore>,
    ) -> Self {
        Self {
            source,
            merger,
            verifier,
            graph_builder,
            vector_store,
            graph_store,
            embedder,
            documents,
        }
    }

    /// Ingest one document. Re-ingesting identical bytes is a no-op.
    pub async fn process_document(
        &self,
        bytes: &[u8],
        file_name: &str,
        progress: Option<ProgressCallback>,
        cancel: &CancelFlag,
    ) -> Result<IngestOutcome> {
        let hash = hex::encode(Sha256::digest(bytes));
        if let Some(existing) = self.documents.get(&hash)? {
            info!(
                file_name,
                existing = existing.filename,
                "Identical document already ingested, skipping"
            );
            return Ok(IngestOutcome::AlreadyIngested);
        }

        info!(file_name, size = bytes.len(), "Ingesting document");
        report(&progress, 0, 0, "parsing document structure");

        // Parser failure is the one hard failure with nothing to roll back
        let blocks = self.source.parse(bytes, file_name)?;

        // Any failure past parsing (including cancellation) removes the
        // document's partial writes before the error propagates
        match self
            .run_phases(blocks, file_name, &hash, bytes.len() as u64, progress, cancel)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                warn!(file_name, error = %err, "Ingestion failed, rolling back partial writes");
                self.rollback(file_name).await;
                Err(err)
            }
        }
    }

    async fn run_phases(
        &self,
        blocks: Vec<crate::types::RawBlock>,
        file_name: &str,
        hash: &str,
        size: u64,
        progress: Option<ProgressCallback>,
        cancel: &CancelFlag,
    ) -> Result<IngestOutcome> {
        cancel.check()?;
        let chunks = self.merger.merge(blocks).await;
        cancel.check()?;

        report(&progress, 0, chunks.len(), "starting verification");
        let verified = self.verifier.verify(chunks, progress, cancel).await?;

        let graph = self.graph_builder.build_from_chunks(&verified, file_name).await;
        cancel.check()?;

        self.index_vectors(&verified, file_name).await;
        cancel.check()?;

        self.documents.add(&DocumentRecord::processed(
            hash.to_string(),
            file_name.to_string(),
            size,
        ))?;

        Ok(IngestOutcome::Ingested {
            chunks: verified,
            graph,
        })
    }

    /// Embed and upsert every verified chunk. Per-chunk failures are
    /// logged and skipped; absence of an embedder skips indexing outright.
    async fn index_vectors(&self, verified: &[VerifiedChunk], file_name: &str) {
        let Some(embedder) = &self.embedder else {
            warn!(file_name, "No embedder configured, skipping vector indexing");
            return;
        };

        let mut indexed = 0usize;
        for chunk in verified {
            if chunk.verified_content.is_empty() {
                continue;
            }
            let vector = match embedder.embed(&chunk.verified_content).await {
                Ok(v) if !v.is_empty() => v,
                Ok(_) => continue,
                Err(e) => {
                    warn!(page = chunk.chunk.page, "Failed to embed chunk: {}", e);
                    continue;
                }
            };

            let metadata = ContextMetadata {
                file_name: file_name.to_string(),
                page: chunk.chunk.page,
                kind: chunk.chunk.kind.as_str().to_string(),
                tier: chunk.chunk.tier,
                coordinates: chunk.chunk.coordinates,
                content: chunk.verified_content.clone(),
                image_base64: (chunk.chunk.kind == BlockKind::Image)
                    .then(|| chunk.chunk.content.clone()),
            };

            let id = Uuid::new_v4().to_string();
            if let Err(e) = self.vector_store.upsert(&id, vector, metadata).await {
                warn!(page = chunk.chunk.page, "Failed to index chunk: {}", e);
                continue;
            }
            indexed += 1;
        }
        info!(file_name, indexed, total = verified.len(), "Vector indexing complete");
    }

    /// Delete every partial write for a document. Cleanup failures are
    /// logged, not propagated - the original error matters more.
    async fn rollback(&self, file_name: &str) {
        if let Err(e) = self.vector_store.delete_by_file(file_name).await {
            warn!(file_name, "Vector cleanup failed: {}", e);
        }
        if let Err(e) = self.graph_store.delete_document(file_name).await {
            warn!(file_name, "Graph cleanup failed: {}", e);
        }
        if let Err(e) = self.documents.delete_by_filename(file_name) {
            warn!(file_name, "Registry cleanup failed: {}", e);
        }
    }

    /// Remove an ingested document from every store.
    pub async fn delete_document(&self, file_name: &str) -> Result<()> {
        self.vector_store.delete_by_file(file_name).await?;
        self.graph_store.delete_document(file_name).await?;
        self.documents.delete_by_filename(file_name)?;
        info!(file_name, "Document deleted");
        Ok(())
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }
}

fn report(progress: &Option<ProgressCallback>, current: usize, total: usize, message: &str) {
    if let Some(callback) = progress {
        callback(current, total, message);
    }
}
