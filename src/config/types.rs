//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/wafermind/) and project (.wafermind/) level
//! configuration.

use serde::{Deserialize, Serialize};

use crate::constants::{merger, pool, retrieval};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// LLM generation settings
    pub llm: LlmConfig,

    /// Embedding model settings
    pub embedding: EmbeddingConfig,

    /// Ingestion pipeline settings
    pub ingest: IngestConfig,

    /// Per-route retrieval strategies
    pub retrieval: RetrievalConfig,

    /// Tier keyword lists for content classification
    pub tiers: TierKeywords,

    /// Storage settings
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            ingest: IngestConfig::default(),
            retrieval: RetrievalConfig::default(),
            tiers: TierKeywords::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `WaferError::Config` on validation failure.
    pub fn validate(&self) -> crate::types::Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(crate::types::WaferError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(crate::types::WaferError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.ingest.workers == 0 {
            return Err(crate::types::WaferError::Config(
                "ingest workers must be greater than 0".to_string(),
            ));
        }

        if self.ingest.max_chars == 0 {
            return Err(crate::types::WaferError::Config(
                "ingest max_chars must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.ingest.semantic_threshold) {
            return Err(crate::types::WaferError::Config(format!(
                "semantic_threshold must be between 0.0 and 1.0, got {}",
                self.ingest.semantic_threshold
            )));
        }

        Ok(())
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider type: "gemini", "ollama"
    pub provider: String,

    /// High-rigor model for verification, extraction, and answering
    pub model: Option<String>,

    /// Low-cost model for routing and auditing
    pub flash_model: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// API key. Never serialized to output; read from config or
    /// WAFERMIND_LLM_API_KEY.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Temperature for generation (0.0 = deterministic)
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: None,
            flash_model: None,
            api_base: None,
            api_key: None,
            timeout_secs: 120,
            temperature: 0.0,
        }
    }
}

// =============================================================================
// Embedding Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Disabling embeddings degrades the merger to structural splitting only
    pub enabled: bool,

    /// Embeddings endpoint base URL
    pub api_base: String,

    /// Embedding model name
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: "http://localhost:11434".to_string(),
            model: "bge-m3".to_string(),
        }
    }
}

// =============================================================================
// Ingestion Configuration
// =============================================================================

/// Verification policy for RED-tier chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RedPolicy {
    /// One high-rigor generation call per chunk
    #[default]
    Single,
    /// Three independent calls, majority answer wins
    Majority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum characters per merged text chunk
    pub max_chars: usize,

    /// Cosine-similarity threshold for the semantic merge break
    pub semantic_threshold: f32,

    /// Bounded worker-pool size shared by verification, graph extraction,
    /// and retrieval fan-out
    pub workers: usize,

    /// RED-tier verification policy
    pub red_policy: RedPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_chars: merger::MAX_CHARS,
            semantic_threshold: merger::SEMANTIC_THRESHOLD,
            workers: pool::DEFAULT_WORKERS,
            red_policy: RedPolicy::Single,
        }
    }
}

// =============================================================================
// Retrieval Strategies
// =============================================================================

/// Limit (and optional similarity threshold) for one retrieval method
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MethodLimits {
    pub limit: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
}

impl MethodLimits {
    pub fn limit(limit: usize) -> Self {
        Self {
            limit,
            threshold: None,
        }
    }

    pub fn with_threshold(limit: usize, threshold: f32) -> Self {
        Self {
            limit,
            threshold: Some(threshold),
        }
    }
}

/// Graph-search parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GraphParams {
    /// Traversal depth (reserved for multi-hop expansion)
    pub depth: u32,
    /// Maximum relations rendered into the synthetic context
    pub relation_cap: usize,
}

impl Default for GraphParams {
    fn default() -> Self {
        Self {
            depth: 3,
            relation_cap: retrieval::GRAPH_RELATION_CAP,
        }
    }
}

/// Which retrieval methods run for one route type, with their limits.
/// A `None` method is skipped entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalStrategy {
    pub exact_match: Option<MethodLimits>,
    pub vector_search: Option<MethodLimits>,
    pub graph_search: Option<GraphParams>,
    pub tables: Option<MethodLimits>,
    pub images: Option<MethodLimits>,
}

/// The per-route strategy table. This is configuration, not logic: the
/// defaults reproduce the tuned production values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub factual: RetrievalStrategy,
    pub conceptual: RetrievalStrategy,
    pub relational: RetrievalStrategy,
    pub comparative: RetrievalStrategy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            factual: RetrievalStrategy {
                exact_match: Some(MethodLimits::limit(3)),
                vector_search: Some(MethodLimits::with_threshold(2, 0.85)),
                graph_search: None,
                tables: Some(MethodLimits::limit(3)),
                images: Some(MethodLimits::limit(2)),
            },
            conceptual: RetrievalStrategy {
                exact_match: None,
                vector_search: Some(MethodLimits::with_threshold(5, 0.75)),
                graph_search: None,
                tables: Some(MethodLimits::limit(3)),
                images: Some(MethodLimits::limit(3)),
            },
            relational: RetrievalStrategy {
                exact_match: None,
                vector_search: None,
                graph_search: Some(GraphParams::default()),
                tables: Some(MethodLimits::limit(3)),
                images: Some(MethodLimits::limit(2)),
            },
            comparative: RetrievalStrategy {
                exact_match: None,
                vector_search: Some(MethodLimits::limit(10)),
                graph_search: None,
                tables: Some(MethodLimits::limit(3)),
                images: None,
            },
        }
    }
}

// =============================================================================
// Tier Keywords
// =============================================================================

/// Keyword lists for the priority-ordered tier scan. RED wins over YELLOW;
/// anything unmatched is GREEN.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierKeywords {
    pub red: Vec<String>,
    pub yellow: Vec<String>,
}

impl Default for TierKeywords {
    fn default() -> Self {
        Self {
            red: [
                "Breakdown Voltage",
                "DRC",
                "LDMOS",
                "NLDMOS",
                "MIM",
                "CMOS",
                "BCD",
                "Leakage Current",
                "Design Rule",
                "Process Parameter",
                "Threshold Voltage",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            yellow: [
                "Table",
                "Figure",
                "Diagram",
                "Flowchart",
                "Parameter Table",
                "Characteristic Curve",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

// =============================================================================
// Storage Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite document registry
    pub registry_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            registry_path: ".wafermind/registry.db".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_temperature_rejected() {
        let mut config = Config::default();
        config.llm.temperature = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = Config::default();
        config.ingest.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_strategy_table_matches_tuned_values() {
        let retrieval = RetrievalConfig::default();
        assert_eq!(retrieval.factual.exact_match.unwrap().limit, 3);
        assert_eq!(retrieval.factual.vector_search.unwrap().threshold, Some(0.85));
        assert!(retrieval.relational.graph_search.is_some());
        assert!(retrieval.relational.vector_search.is_none());
        assert_eq!(retrieval.comparative.vector_search.unwrap().limit, 10);
        assert!(retrieval.comparative.images.is_none());
    }

    #[test]
    fn test_red_keywords_present_by_default() {
        let tiers = TierKeywords::default();
        assert!(tiers.red.iter().any(|k| k == "Breakdown Voltage"));
        assert!(tiers.yellow.iter().any(|k| k == "Table"));
    }
}
