//! Document Ingestion
//!
//! The tiered ingestion pipeline: parser-boundary normalization, keyword
//! classification, chunk merging, concurrent tiered verification, and the
//! `process_document` orchestration with idempotency, cancellation, and
//! rollback.

pub mod adapter;
pub mod classifier;
pub mod merger;
pub mod pipeline;
pub mod verifier;

pub use adapter::{BlockSource, JsonBlockSource, normalize_block};
pub use classifier::TierClassifier;
pub use merger::ChunkMerger;
pub use pipeline::{IngestOutcome, IngestPipeline};
pub use verifier::TieredVerifier;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::{Result, WaferError};

/// Progress callback: `(completed, total, message)`, invoked after each
/// unit of work.
pub type ProgressCallback = Arc<dyn Fn(usize, usize, &str) + Send + Sync>;

/// Shared cooperative-cancellation flag, checked between pipeline phases
/// and alongside progress reporting.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Raise the cancellation sentinel if the flag is set.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(WaferError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_shared_across_clones() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(flag.check().is_ok());
        clone.cancel();
        assert!(flag.is_cancelled());
        assert!(flag.check().is_err());
    }
}
