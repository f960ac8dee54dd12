//! Knowledge-Graph Triples

use serde::{Deserialize, Serialize};

/// A directed `(source) -[relation]-> (target)` fact extracted from text.
///
/// All three fields are non-empty by construction; `Triple::new` rejects
/// incomplete extractions so they are never partially persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub source: String,
    pub relation: String,
    pub target: String,
}

impl Triple {
    /// Build a triple, rejecting any empty field.
    pub fn new(source: &str, relation: &str, target: &str) -> Option<Self> {
        let source = source.trim();
        let relation = relation.trim();
        let target = target.trim();
        if source.is_empty() || relation.is_empty() || target.is_empty() {
            return None;
        }
        Some(Self {
            source: source.to_string(),
            relation: relation.to_string(),
            target: target.to_string(),
        })
    }

    /// Exact-match deduplication key.
    pub fn key(&self) -> String {
        format!("{}|{}|{}", self.source, self.relation, self.target)
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.source, self.relation, self.target)
    }
}
