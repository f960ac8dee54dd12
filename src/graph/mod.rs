//! Knowledge Graph Extraction
//!
//! Turns verified chunk content into `(source, relation, target)` triples
//! and persists them with per-chunk provenance.

mod builder;
mod extractor;

pub use builder::{GraphBuildStats, GraphBuilder, block_id_for};
pub use extractor::TripleExtractor;
