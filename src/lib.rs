//! WaferMind - Retrieval-Augmented Knowledge Base for Process Documentation
//!
//! A question-answering system over technical PDF documents (IC/BCD
//! semiconductor process specifications). Documents are classified into
//! reliability tiers, merged into coherent chunks, verified with
//! tier-proportional rigor, and indexed into vector and knowledge-graph
//! stores. Queries run through a routed, multi-modal retrieval fan-out
//! and a self-correcting generate/audit loop.
//!
//! ## Core Pieces
//!
//! - **Ingestion**: classify → merge → verify, concurrent and
//!   fault-isolated, with hash-based idempotency and rollback
//! - **Query flow**: ROUTE → RETRIEVE → ANALYZE → GENERATE → AUDIT with a
//!   bounded correction loop and fail-open auditing
//!
//! ## Quick Start
//!
//! ```ignore
//! use wafermind::cli::session::Session;
//! use wafermind::config::ConfigLoader;
//! use wafermind::ingest::CancelFlag;
//!
//! let config = ConfigLoader::load()?;
//! let session = Session::build(&config)?;
//! session.pipeline.process_document(&bytes, "spec.pdf", None, &CancelFlag::new()).await?;
//! let outcome = session.flow.answer_query("What is the NLDMOS breakdown voltage?").await;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: generation/embedding providers, retry policy, JSON recovery
//! - [`ingest`]: the tiered ingestion pipeline
//! - [`graph`]: knowledge-graph extraction and persistence
//! - [`query`]: routing, retrieval fan-out, and the audit state machine
//! - [`storage`]: store traits, in-memory backends, document registry

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod graph;
pub mod ingest;
pub mod pool;
pub mod query;
pub mod storage;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader, RedPolicy};

// Error Types
pub use types::error::{ErrorCategory, Result, WaferError};

// Data model
pub use types::{MergedChunk, RawBlock, RetrievedContext, Tier, Triple, VerifiedChunk};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use ingest::{CancelFlag, IngestOutcome, IngestPipeline, ProgressCallback};
pub use pool::{SharedPool, WorkerPool};
pub use query::{QueryFlow, QueryOutcome};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    GenerationOptions,
    Generator,
    ResilientGenerator,
    RetryPolicy,
    SharedEmbedder,
    SharedGenerator,
    create_generator,
};
