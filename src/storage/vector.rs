//! Vector Store
//!
//! Trait for the external vector index plus a lock-free in-memory
//! implementation (brute-force cosine over a `DashMap`, adequate for
//! corpora up to low tens of thousands of chunks).

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::ai::cosine_similarity;
use crate::types::{ContextMetadata, Result, RetrievedContext};

pub type SharedVectorStore = Arc<dyn VectorStore>;

/// External vector index. Upserts are atomic per id on the backend side.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace a point.
    async fn upsert(&self, id: &str, vector: Vec<f32>, metadata: ContextMetadata) -> Result<()>;

    /// Similarity search, optionally bounded by a score threshold and
    /// filtered by stored block kind.
    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        threshold: Option<f32>,
        kind_filter: Option<&str>,
    ) -> Result<Vec<RetrievedContext>>;

    /// Similarity search restricted to points whose content contains the
    /// query text (case-insensitive).
    async fn text_match(
        &self,
        query_text: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedContext>>;

    /// Remove every point belonging to a file.
    async fn delete_by_file(&self, file_name: &str) -> Result<()>;
}

// =============================================================================
// In-Memory Implementation
// =============================================================================

struct StoredPoint {
    vector: Vec<f32>,
    metadata: ContextMetadata,
}

/// Reference vector store: `DashMap` points, brute-force cosine ranking.
#[derive(Default)]
pub struct InMemoryVectorStore {
    points: DashMap<String, StoredPoint>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn ranked(
        &self,
        vector: &[f32],
        mut keep: impl FnMut(&ContextMetadata) -> bool,
    ) -> Vec<RetrievedContext> {
        let mut hits: Vec<RetrievedContext> = self
            .points
            .iter()
            .filter(|entry| keep(&entry.value().metadata))
            .map(|entry| RetrievedContext {
                score: cosine_similarity(vector, &entry.value().vector),
                id: entry.key().clone(),
                metadata: entry.value().metadata.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, id: &str, vector: Vec<f32>, metadata: ContextMetadata) -> Result<()> {
        self.points
            .insert(id.to_string(), StoredPoint { vector, metadata });
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        threshold: Option<f32>,
        kind_filter: Option<&str>,
    ) -> Result<Vec<RetrievedContext>> {
        let mut hits = self.ranked(vector, |meta| {
            kind_filter.is_none_or(|kind| meta.kind == kind)
        });
        if let Some(min_score) = threshold {
            hits.retain(|hit| hit.score >= min_score);
        }
        hits.truncate(limit);
        Ok(hits)
    }

    async fn text_match(
        &self,
        query_text: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedContext>> {
        let needle = query_text.to_lowercase();
        let mut hits = self.ranked(vector, |meta| meta.content.to_lowercase().contains(&needle));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete_by_file(&self, file_name: &str) -> Result<()> {
        self.points
            .retain(|_, point| point.metadata.file_name != file_name);
        Ok(())
    }
}
