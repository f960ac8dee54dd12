//! Generation Provider Abstraction
//!
//! Defines the `Generator` trait consumed by every component that needs
//! text or multimodal generation. Providers are thin HTTP adapters; the
//! retry contract lives in [`crate::ai::retry`], not here - a provider
//! surfaces categorized errors and lets the policy decide.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::types::{Result, WaferError};

/// Per-call generation options.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationOptions {
    /// Use the high-rigor model instead of the low-cost one
    pub use_pro: bool,
    /// Override the configured temperature
    pub temperature: Option<f32>,
}

impl GenerationOptions {
    /// High-rigor model, configured temperature.
    pub fn pro() -> Self {
        Self {
            use_pro: true,
            temperature: None,
        }
    }

    /// Low-cost deterministic call, used for routing and auditing.
    pub fn flash_deterministic() -> Self {
        Self {
            use_pro: false,
            temperature: Some(0.0),
        }
    }
}

/// Shared generator handle for concurrent access across pipeline stages.
pub type SharedGenerator = Arc<dyn Generator>;

/// Text/multimodal generation capability.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate text from a prompt.
    async fn generate_text(&self, prompt: &str, opts: GenerationOptions) -> Result<String>;

    /// Generate text from a prompt plus one base64-encoded image.
    async fn generate_multimodal(&self, prompt: &str, image_base64: &str) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Check if the provider is available
    async fn health_check(&self) -> Result<bool>;
}

// =============================================================================
// Provider Configuration
// =============================================================================

/// Configuration for generation providers.
///
/// Note: API keys are handled securely - they are never serialized to
/// output and are redacted in debug output. Each provider converts the key
/// to SecretString internally for runtime protection.
#[derive(Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Provider type: "gemini", "ollama"
    pub provider: String,
    /// High-rigor model name (provider-specific)
    pub model: Option<String>,
    /// Low-cost model name
    pub flash_model: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Default temperature
    pub temperature: f32,
    /// API key. Never serialized to output for security
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// API base URL (for custom endpoints)
    #[serde(default)]
    pub api_base: Option<String>,
}

impl std::fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("flash_model", &self.flash_model)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: None,
            flash_model: None,
            timeout_secs: 120,
            temperature: 0.0,
            api_key: None,
            api_base: None,
        }
    }
}

impl From<&crate::config::LlmConfig> for GeneratorConfig {
    fn from(cfg: &crate::config::LlmConfig) -> Self {
        Self {
            provider: cfg.provider.clone(),
            model: cfg.model.clone(),
            flash_model: cfg.flash_model.clone(),
            timeout_secs: cfg.timeout_secs,
            temperature: cfg.temperature,
            api_key: cfg.api_key.clone(),
            api_base: cfg.api_base.clone(),
        }
    }
}

/// Create a shared generator from configuration.
pub fn create_generator(config: &GeneratorConfig) -> Result<SharedGenerator> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(super::gemini::GeminiProvider::new(
            config.clone(),
        )?)),
        "ollama" => Ok(Arc::new(super::ollama::OllamaProvider::new(
            config.clone(),
        )?)),
        _ => Err(WaferError::Config(format!(
            "Unknown provider: {}. Supported: gemini, ollama",
            config.provider
        ))),
    }
}

/// Validate a provider endpoint URL for security (SSRF prevention).
///
/// Only allows http/https schemes and warns for non-localhost endpoints.
pub(crate) fn validate_endpoint(endpoint: &str) -> Result<String> {
    let url = url::Url::parse(endpoint)
        .map_err(|e| WaferError::Config(format!("Invalid endpoint URL '{}': {}", endpoint, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(WaferError::Config(format!(
            "Endpoint must use http or https scheme, got: {}",
            url.scheme()
        )));
    }

    if url.scheme() == "http"
        && let Some(host) = url.host_str()
        && !matches!(host, "localhost" | "127.0.0.1" | "::1")
    {
        tracing::warn!(
            "Plain-http endpoint is not localhost: {}. Ensure this is intentional.",
            host
        );
    }

    let mut result = url.to_string();
    if result.ends_with('/') {
        result.pop();
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_endpoint_rejects_bad_schemes() {
        assert!(validate_endpoint("file:///etc/passwd").is_err());
        assert!(validate_endpoint("not a url").is_err());
        assert!(validate_endpoint("http://localhost:11434").is_ok());
    }

    #[test]
    fn test_validate_endpoint_strips_trailing_slash() {
        let cleaned = validate_endpoint("http://localhost:11434/").unwrap();
        assert_eq!(cleaned, "http://localhost:11434");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = GeneratorConfig {
            api_key: Some("secret-key".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_create_generator_unknown_provider() {
        let config = GeneratorConfig {
            provider: "mystery".to_string(),
            ..Default::default()
        };
        assert!(create_generator(&config).is_err());
    }
}
