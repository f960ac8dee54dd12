//! Gemini HTTP Provider
//!
//! Text and multimodal generation against the Generative Language API.
//! Selects between a high-rigor model and a low-cost flash model per call.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::generator::{GenerationOptions, Generator, GeneratorConfig, validate_endpoint};
use crate::types::{ErrorCategory, GenerationError, Result, WaferError};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_PRO_MODEL: &str = "gemini-1.5-pro";
const DEFAULT_FLASH_MODEL: &str = "gemini-1.5-flash";

/// Gemini generation provider.
pub struct GeminiProvider {
    api_base: String,
    pro_model: String,
    flash_model: String,
    temperature: f32,
    api_key: SecretString,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        let api_base = validate_endpoint(
            &config
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        )?;

        let api_key = config
            .api_key
            .ok_or_else(|| WaferError::Config("Gemini provider requires an API key".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WaferError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_base,
            pro_model: config
                .model
                .unwrap_or_else(|| DEFAULT_PRO_MODEL.to_string()),
            flash_model: config
                .flash_model
                .unwrap_or_else(|| DEFAULT_FLASH_MODEL.to_string()),
            temperature: config.temperature,
            api_key: SecretString::from(api_key),
            client,
        })
    }

    fn model_for(&self, opts: GenerationOptions) -> &str {
        if opts.use_pro {
            &self.pro_model
        } else {
            &self.flash_model
        }
    }

    async fn call(&self, model: &str, request: GenerateContentRequest) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.api_base,
            model,
            self.api_key.expose_secret()
        );

        debug!("Sending request to Gemini API (model: {})", model);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let category = if e.is_connect() || e.is_timeout() {
                    ErrorCategory::Network
                } else {
                    ErrorCategory::Unknown
                };
                GenerationError::with_provider(
                    category,
                    format!("Gemini request failed: {}", e),
                    "gemini",
                )
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::from_http_status(
                status,
                format!("Gemini API error: {}", body),
                "gemini",
            )
            .into());
        }

        let body: GenerateContentResponse = response.json().await.map_err(|e| {
            GenerationError::with_provider(
                ErrorCategory::ParseError,
                format!("Failed to parse Gemini response: {}", e),
                "gemini",
            )
        })?;

        // An empty candidate list means the response was blocked or empty;
        // callers treat an empty string as a soft failure.
        Ok(body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .and_then(|p| p.text)
            .unwrap_or_default())
    }
}

#[async_trait]
impl Generator for GeminiProvider {
    async fn generate_text(&self, prompt: &str, opts: GenerationOptions) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::text(prompt)],
            }],
            generation_config: Some(GenerationConfig {
                temperature: opts.temperature.unwrap_or(self.temperature),
            }),
        };
        self.call(self.model_for(opts), request).await
    }

    async fn generate_multimodal(&self, prompt: &str, image_base64: &str) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::text(prompt), Part::image(image_base64)],
            }],
            generation_config: None,
        };
        // Image understanding always uses the high-rigor model
        self.call(&self.pro_model, request).await
    }

    fn name(&self) -> &str {
        "gemini"
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!(
            "{}/v1beta/models?key={}",
            self.api_base,
            self.api_key.expose_secret()
        );
        match self.client.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            inline_data: None,
        }
    }

    fn image(base64: &str) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: "image/png".to_string(),
                data: base64.to_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}
