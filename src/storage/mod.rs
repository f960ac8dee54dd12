//! Storage Layer
//!
//! The vector index and graph database are external services consumed
//! through the traits below; the in-memory implementations are the
//! reference backends used for local deployments and tests. Both rely on
//! the backing store's own upsert-by-key semantics for atomicity - the
//! orchestration layer never holds a lock across an I/O call.
//!
//! The document registry (idempotent re-ingestion bookkeeping) is local
//! SQLite with connection pooling.

mod documents;
mod graph;
mod vector;

pub use documents::{DocumentRecord, DocumentStore};
pub use graph::{GraphStats, GraphStore, InMemoryGraphStore, SharedGraphStore};
pub use vector::{InMemoryVectorStore, SharedVectorStore, VectorStore};
