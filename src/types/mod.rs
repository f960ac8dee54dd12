//! Core Data Types
//!
//! Shared data model for the ingestion pipeline, retrieval, and the query
//! state machine, plus the unified error type.

pub mod block;
pub mod context;
pub mod error;
pub mod triple;

pub use block::{BBox, BlockKind, MergedChunk, RawBlock, Tier, VerifiedChunk};
pub use context::{ContextMetadata, RetrievedContext, render_context_text};
pub use error::{ErrorCategory, GenerationError, Result, WaferError};
pub use triple::Triple;
