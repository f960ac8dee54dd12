//! Knowledge Graph Store
//!
//! Trait for the external graph database plus an in-memory reference
//! implementation. Entities are globally shared across documents
//! (upsert-by-name, monotonic); relations are keyed by the exact
//! `(source, relation, target)` triple so re-persisting is idempotent.
//! Provenance `Block` nodes are per-file and removed with their document,
//! while shared `Term` entities survive document deletion.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{Result, Triple};

pub const MENTIONED_IN: &str = "MENTIONED_IN";

pub type SharedGraphStore = Arc<dyn GraphStore>;

/// Aggregate counts, used by the status surface.
#[derive(Debug, Clone, Default)]
pub struct GraphStats {
    pub entities: usize,
    pub relations: usize,
    pub relation_kinds: HashMap<String, usize>,
}

/// External graph database. All upserts are merge-by-key on the backend.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create or reuse an entity node.
    async fn upsert_entity(&self, name: &str, kind: &str) -> Result<()>;

    /// Create or reuse a directed relation; both endpoints are upserted.
    async fn upsert_relation(&self, triple: &Triple) -> Result<()>;

    /// Create or update a provenance block node.
    async fn upsert_block(
        &self,
        block_id: &str,
        file_name: &str,
        page: u32,
        content: &str,
        kind: &str,
    ) -> Result<()>;

    /// Link an entity to the block it was extracted from.
    async fn link_mention(&self, entity: &str, block_id: &str) -> Result<()>;

    /// Outgoing relations of an entity, optionally filtered by relation type.
    async fn search_relations(&self, entity: &str, relation: Option<&str>) -> Result<Vec<Triple>>;

    /// Remove a document's provenance blocks and their mention edges.
    /// Shared entities are intentionally preserved.
    async fn delete_document(&self, file_name: &str) -> Result<()>;

    async fn stats(&self) -> Result<GraphStats>;
}

// =============================================================================
// In-Memory Implementation
// =============================================================================

#[derive(Debug, Clone)]
struct EntityRecord {
    kind: String,
    /// Set only for Block provenance nodes
    file_name: Option<String>,
}

/// Reference graph store backed by `DashMap`s.
#[derive(Default)]
pub struct InMemoryGraphStore {
    entities: DashMap<String, EntityRecord>,
    /// Keyed by `Triple::key()` for idempotent upserts
    relations: DashMap<String, Triple>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn upsert_entity(&self, name: &str, kind: &str) -> Result<()> {
        self.entities
            .entry(name.to_string())
            .or_insert_with(|| EntityRecord {
                kind: kind.to_string(),
                file_name: None,
            });
        Ok(())
    }

    async fn upsert_relation(&self, triple: &Triple) -> Result<()> {
        self.upsert_entity(&triple.source, "Term").await?;
        self.upsert_entity(&triple.target, "Term").await?;
        self.relations.insert(triple.key(), triple.clone());
        Ok(())
    }

    async fn upsert_block(
        &self,
        block_id: &str,
        file_name: &str,
        _page: u32,
        _content: &str,
        _kind: &str,
    ) -> Result<()> {
        self.entities.insert(
            block_id.to_string(),
            EntityRecord {
                kind: "Block".to_string(),
                file_name: Some(file_name.to_string()),
            },
        );
        Ok(())
    }

    async fn link_mention(&self, entity: &str, block_id: &str) -> Result<()> {
        self.upsert_entity(entity, "Term").await?;
        if let Some(triple) = Triple::new(entity, MENTIONED_IN, block_id) {
            self.relations.insert(triple.key(), triple);
        }
        Ok(())
    }

    async fn search_relations(&self, entity: &str, relation: Option<&str>) -> Result<Vec<Triple>> {
        Ok(self
            .relations
            .iter()
            .filter(|entry| {
                entry.value().source == entity
                    && relation.is_none_or(|r| entry.value().relation == r)
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn delete_document(&self, file_name: &str) -> Result<()> {
        let block_ids: Vec<String> = self
            .entities
            .iter()
            .filter(|entry| {
                entry.value().kind == "Block"
                    && entry.value().file_name.as_deref() == Some(file_name)
            })
            .map(|entry| entry.key().clone())
            .collect();

        for block_id in &block_ids {
            self.entities.remove(block_id);
        }
        self.relations.retain(|_, triple| {
            !block_ids.contains(&triple.target) && !block_ids.contains(&triple.source)
        });
        Ok(())
    }

    async fn stats(&self) -> Result<GraphStats> {
        let mut relation_kinds: HashMap<String, usize> = HashMap::new();
        for entry in self.relations.iter() {
            *relation_kinds
                .entry(entry.value().relation.clone())
                .or_default() += 1;
        }
        Ok(GraphStats {
            entities: self.entities.len(),
            relations: self.relations.len(),
            relation_kinds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(s: &str, r: &str, t: &str) -> Triple {
        Triple::new(s, r, t).unwrap()
    }

    #[tokio::test]
    async fn test_relation_upsert_is_idempotent() {
        let store = InMemoryGraphStore::new();
        let t = triple("NLDMOS", "Has_property", "60V");
        store.upsert_relation(&t).await.unwrap();
        store.upsert_relation(&t).await.unwrap();
        assert_eq!(store.relation_count(), 1);
        assert_eq!(store.entity_count(), 2);
    }

    #[tokio::test]
    async fn test_entities_shared_across_documents() {
        let store = InMemoryGraphStore::new();
        store.upsert_entity("NLDMOS", "Term").await.unwrap();
        // A second document mentioning the same entity reuses the node
        store.upsert_entity("NLDMOS", "Term").await.unwrap();
        assert_eq!(store.entity_count(), 1);
    }

    #[tokio::test]
    async fn test_search_relations_with_filter() {
        let store = InMemoryGraphStore::new();
        store
            .upsert_relation(&triple("A", "Connected_to", "B"))
            .await
            .unwrap();
        store
            .upsert_relation(&triple("A", "Defined_in", "C"))
            .await
            .unwrap();
        store
            .upsert_relation(&triple("B", "Connected_to", "C"))
            .await
            .unwrap();

        let all = store.search_relations("A", None).await.unwrap();
        assert_eq!(all.len(), 2);

        let filtered = store
            .search_relations("A", Some("Defined_in"))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].target, "C");
    }

    #[tokio::test]
    async fn test_delete_document_keeps_shared_entities() {
        let store = InMemoryGraphStore::new();
        store
            .upsert_relation(&triple("NLDMOS", "Has_property", "60V"))
            .await
            .unwrap();
        store
            .upsert_block("block_abc", "spec.pdf", 1, "content", "text")
            .await
            .unwrap();
        store.link_mention("NLDMOS", "block_abc").await.unwrap();

        store.delete_document("spec.pdf").await.unwrap();

        // Block node and its mention edge are gone, the term survives
        let stats = store.stats().await.unwrap();
        assert!(!stats.relation_kinds.contains_key(MENTIONED_IN));
        let relations = store.search_relations("NLDMOS", None).await.unwrap();
        assert_eq!(relations.len(), 1);
    }
}
