//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Chunk merger constants
pub mod merger {
    /// Maximum characters per merged text chunk
    pub const MAX_CHARS: usize = 1000;

    /// Cosine-similarity threshold below which consecutive blocks are
    /// considered semantically unrelated and split
    pub const SEMANTIC_THRESHOLD: f32 = 0.5;

    /// Fraction of table-like lines above which a merged chunk is flagged
    /// as a potential table
    pub const TABLE_LINE_RATIO: f32 = 0.4;

    /// Minimum line count before the table-ratio heuristic applies
    pub const TABLE_MIN_LINES: usize = 2;

    /// Lines shorter than this are never counted as table rows
    pub const TABLE_ROW_MIN_CHARS: usize = 5;
}

/// Worker pool and fan-out constants
pub mod pool {
    /// Default bounded concurrency for verification, graph extraction, and
    /// retrieval fan-out (all I/O-bound)
    pub const DEFAULT_WORKERS: usize = 5;
}

/// Retry policy constants
pub mod retry {
    /// Maximum attempts per external call
    pub const MAX_ATTEMPTS: usize = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 1_000;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 10;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f32 = 2.0;
}

/// Query flow constants
pub mod flow {
    /// Hard cap on generate-audit revisions; the loop always terminates here
    pub const REVISION_CAP: u32 = 3;
}

/// Retrieval constants
pub mod retrieval {
    /// Maximum relations rendered into the synthetic graph-search context
    pub const GRAPH_RELATION_CAP: usize = 50;

    /// Maximum fallback search terms when no keywords were extracted
    pub const GRAPH_FALLBACK_TERMS: usize = 3;
}
