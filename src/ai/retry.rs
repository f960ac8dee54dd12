//! Explicit Retry Policy for External Calls
//!
//! Every generation call in the pipeline goes through
//! [`ResilientGenerator`], which makes the failure contract visible at the
//! call site: transient failures are retried with exponential backoff and
//! jitter, and once attempts are exhausted the call returns an **empty
//! string** rather than an error. Downstream components treat empty output
//! as a soft miss (default route, pass-through verification, no triples).

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::generator::{GenerationOptions, Generator, SharedGenerator};
use crate::constants::retry;
use crate::types::WaferError;

/// Retry schedule: attempt cap, backoff curve, and jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts (first call included)
    pub max_attempts: usize,
    /// Base delay before the first retry
    pub base_delay: Duration,
    /// Cap on any single delay
    pub max_delay: Duration,
    /// Multiplier applied per retry
    pub backoff_factor: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: retry::MAX_ATTEMPTS,
            base_delay: Duration::from_millis(retry::BASE_DELAY_MS),
            max_delay: Duration::from_secs(retry::MAX_DELAY_SECS),
            backoff_factor: retry::BACKOFF_FACTOR,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), with up to 25% jitter.
    fn delay_for(&self, attempt: usize) -> Duration {
        let exp = self.backoff_factor.powi(attempt.saturating_sub(1) as i32);
        let base = self.base_delay.mul_f32(exp).min(self.max_delay);
        let jitter = rand::rng().random_range(0.0..=0.25);
        base.mul_f32(1.0 + jitter).min(self.max_delay)
    }

    /// Whether the error is worth another attempt.
    fn is_retryable(&self, err: &WaferError) -> bool {
        match err {
            WaferError::Generation(e) => e.is_retryable(),
            // Config errors and cancellations never resolve by retrying
            WaferError::Config(_) | WaferError::Cancelled => false,
            _ => true,
        }
    }
}

/// Generator wrapper enforcing the retry-then-degrade contract.
#[derive(Clone)]
pub struct ResilientGenerator {
    inner: SharedGenerator,
    policy: Arc<RetryPolicy>,
}

impl ResilientGenerator {
    pub fn new(inner: SharedGenerator, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy: Arc::new(policy),
        }
    }

    pub fn with_defaults(inner: SharedGenerator) -> Self {
        Self::new(inner, RetryPolicy::default())
    }

    pub fn provider_name(&self) -> &str {
        self.inner.name()
    }

    /// Generate text; empty string after exhausting retries, never an error.
    pub async fn generate_text(&self, prompt: &str, opts: GenerationOptions) -> String {
        self.run(|| self.inner.generate_text(prompt, opts)).await
    }

    /// Generate from prompt + image; same degradation contract.
    pub async fn generate_multimodal(&self, prompt: &str, image_base64: &str) -> String {
        self.run(|| self.inner.generate_multimodal(prompt, image_base64))
            .await
    }

    async fn run<F, Fut>(&self, call: F) -> String
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = crate::types::Result<String>>,
    {
        let mut last_error = None;

        for attempt in 1..=self.policy.max_attempts {
            match call().await {
                Ok(text) => {
                    if text.is_empty() {
                        debug!(
                            provider = self.inner.name(),
                            attempt, "Generation returned empty content"
                        );
                    }
                    return text;
                }
                Err(err) => {
                    if !self.policy.is_retryable(&err) || attempt == self.policy.max_attempts {
                        last_error = Some(err);
                        break;
                    }

                    let delay = match &err {
                        WaferError::Generation(e) => {
                            e.recommended_delay().min(self.policy.delay_for(attempt))
                        }
                        _ => self.policy.delay_for(attempt),
                    };
                    debug!(
                        provider = self.inner.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Generation failed, retrying"
                    );
                    sleep(delay).await;
                    last_error = Some(err);
                }
            }
        }

        if let Some(err) = last_error {
            warn!(
                provider = self.inner.name(),
                error = %err,
                "Generation failed after {} attempts, returning empty result",
                self.policy.max_attempts
            );
        }
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorCategory, GenerationError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Generator that fails a configurable number of times before succeeding.
    struct FlakyGenerator {
        failures: usize,
        calls: AtomicUsize,
        category: ErrorCategory,
    }

    #[async_trait]
    impl Generator for FlakyGenerator {
        async fn generate_text(&self, _prompt: &str, _opts: GenerationOptions) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(GenerationError::new(self.category, "boom").into())
            } else {
                Ok("answer".to_string())
            }
        }

        async fn generate_multimodal(&self, _prompt: &str, _image: &str) -> Result<String> {
            Ok(String::new())
        }

        fn name(&self) -> &str {
            "flaky"
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_factor: 1.0,
        }
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let inner = Arc::new(FlakyGenerator {
            failures: 2,
            calls: AtomicUsize::new(0),
            category: ErrorCategory::Transient,
        });
        let r#gen = ResilientGenerator::new(inner.clone(), fast_policy());

        let out = r#gen.generate_text("q", GenerationOptions::default()).await;
        assert_eq!(out, "answer");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_empty_never_errors() {
        let inner = Arc::new(FlakyGenerator {
            failures: 10,
            calls: AtomicUsize::new(0),
            category: ErrorCategory::Transient,
        });
        let r#gen = ResilientGenerator::new(inner.clone(), fast_policy());

        let out = r#gen.generate_text("q", GenerationOptions::default()).await;
        assert_eq!(out, "");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_auth_failure_not_retried() {
        let inner = Arc::new(FlakyGenerator {
            failures: 10,
            calls: AtomicUsize::new(0),
            category: ErrorCategory::Auth,
        });
        let r#gen = ResilientGenerator::new(inner.clone(), fast_policy());

        let out = r#gen.generate_text("q", GenerationOptions::default()).await;
        assert_eq!(out, "");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(8),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
        };
        assert!(policy.delay_for(4) <= Duration::from_secs(10));
    }
}
