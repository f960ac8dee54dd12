//! Configuration Management
//!
//! Layered configuration (defaults → global → project → environment) with
//! validation. The retrieval-strategy table and tier keyword lists live
//! here: they are tuning data, not logic.

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    Config, EmbeddingConfig, GraphParams, IngestConfig, LlmConfig, MethodLimits, RedPolicy,
    RetrievalConfig, RetrievalStrategy, StorageConfig, TierKeywords,
};
