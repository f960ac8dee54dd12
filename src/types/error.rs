//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//! Provides error classification for retry decisions at LLM and store
//! call sites.
//!
//! ## Error Categories
//!
//! - **Transient**: Temporary issues that may resolve (retry)
//! - **RateLimit**: API rate limiting (wait and retry)
//! - **Auth**: Authentication failures (fail fast)
//! - **Network**: Connectivity issues (retry with backoff)
//! - **ParseError**: LLM output didn't match the expected shape
//!
//! ## Design Principles
//!
//! - Single unified error type (WaferError) for the entire application
//! - Category-based routing for retry decisions
//! - Cancellation is a distinguished variant, not a generic failure
//! - No panic/unwrap outside tests - all errors are recoverable

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Error categories for retry decisions at external call sites
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rate limited - wait then retry
    RateLimit,
    /// Authentication failed - fail fast, don't retry
    Auth,
    /// Network/connectivity issues - retry with backoff
    Network,
    /// Invalid request - don't retry, fix request
    BadRequest,
    /// Parsing LLM response failed - may retry
    ParseError,
    /// Temporary server issues - retry
    Transient,
    /// Unknown error - conservative retry
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Auth => write!(f, "AUTH"),
            Self::Network => write!(f, "NETWORK"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::ParseError => write!(f, "PARSE_ERROR"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Check if this category is worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Network | Self::Transient | Self::ParseError | Self::Unknown
        )
    }

    /// Get recommended retry delay for this category
    pub fn recommended_delay(&self) -> Duration {
        match self {
            Self::RateLimit => Duration::from_secs(30),
            Self::Network => Duration::from_secs(5),
            Self::Transient => Duration::from_secs(2),
            Self::ParseError => Duration::from_secs(1),
            _ => Duration::from_millis(500),
        }
    }
}

// =============================================================================
// Generation Error
// =============================================================================

/// Error from a generation/embedding call, with category and retry hints
#[derive(Debug, Clone)]
pub struct GenerationError {
    /// Error category for retry decisions
    pub category: ErrorCategory,
    /// Detailed error message
    pub message: String,
    /// Provider that produced the error
    pub provider: Option<String>,
    /// Suggested wait time before retry (if applicable)
    pub retry_after: Option<Duration>,
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{}:{}] {}", provider, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for GenerationError {}

impl GenerationError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            provider: None,
            retry_after: None,
        }
    }

    pub fn with_provider(
        category: ErrorCategory,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            provider: Some(provider.into()),
            retry_after: None,
        }
    }

    /// Add suggested retry delay
    pub fn retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    /// Create from simple message (defaults to Unknown category)
    pub fn from_message(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Unknown, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }

    pub fn recommended_delay(&self) -> Duration {
        self.retry_after
            .unwrap_or_else(|| self.category.recommended_delay())
    }

    /// Classify an HTTP status code into a categorized error
    pub fn from_http_status(status: u16, message: impl Into<String>, provider: &str) -> Self {
        let category = match status {
            429 => ErrorCategory::RateLimit,
            401 | 403 => ErrorCategory::Auth,
            400 => ErrorCategory::BadRequest,
            500 | 502 | 503 | 504 => ErrorCategory::Transient,
            _ => ErrorCategory::Unknown,
        };
        let err = Self::with_provider(category, message, provider);
        match category {
            ErrorCategory::RateLimit => err.retry_after(Duration::from_secs(30)),
            ErrorCategory::Transient => err.retry_after(Duration::from_secs(5)),
            _ => err,
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum WaferError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // External-call Errors
    // -------------------------------------------------------------------------
    /// Structured generation error with category and retry hints
    #[error("Generation error: {0}")]
    Generation(GenerationError),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Store error: {0}")]
    Store(String),

    // -------------------------------------------------------------------------
    // Pipeline Errors
    // -------------------------------------------------------------------------
    /// Document could not be parsed into content blocks at all
    #[error("Parse error in {file_name}: {message}")]
    Parse { file_name: String, message: String },

    /// Cooperative cancellation sentinel. Ingestion catches this between
    /// phases, rolls back partial writes, and re-propagates.
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Config error: {0}")]
    Config(String),
}

impl From<GenerationError> for WaferError {
    fn from(err: GenerationError) -> Self {
        WaferError::Generation(err)
    }
}

impl From<r2d2::Error> for WaferError {
    fn from(err: r2d2::Error) -> Self {
        WaferError::Store(format!("connection pool: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, WaferError>;

impl WaferError {
    /// Create a generation error from a plain message
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(GenerationError::from_message(message))
    }

    /// Create a document-level parse error
    pub fn parse(file_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            file_name: file_name.into(),
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::RateLimit.is_retryable());
        assert!(ErrorCategory::Network.is_retryable());
        assert!(ErrorCategory::Transient.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::BadRequest.is_retryable());
    }

    #[test]
    fn test_from_http_status() {
        let rate_limit = GenerationError::from_http_status(429, "rate limited", "gemini");
        assert_eq!(rate_limit.category, ErrorCategory::RateLimit);
        assert!(rate_limit.recommended_delay() >= Duration::from_secs(30));

        let auth = GenerationError::from_http_status(401, "unauthorized", "gemini");
        assert_eq!(auth.category, ErrorCategory::Auth);
        assert!(!auth.is_retryable());

        let server = GenerationError::from_http_status(503, "unavailable", "ollama");
        assert_eq!(server.category, ErrorCategory::Transient);
        assert!(server.is_retryable());
    }

    #[test]
    fn test_generation_error_display() {
        let err = GenerationError::with_provider(ErrorCategory::RateLimit, "slow down", "gemini");
        assert_eq!(err.to_string(), "[gemini:RATE_LIMIT] slow down");

        let bare = GenerationError::new(ErrorCategory::Network, "connection refused");
        assert_eq!(bare.to_string(), "[NETWORK] connection refused");
    }

    #[test]
    fn test_cancelled_sentinel() {
        let err = WaferError::Cancelled;
        assert!(err.is_cancelled());
        assert!(!WaferError::generation("boom").is_cancelled());
    }
}
