//! LLM and Embedding Access
//!
//! Provider abstraction over external generation and embedding services,
//! the explicit retry policy wrapping every call site, and structured
//! output recovery.
//!
//! ## Modules
//!
//! - `generator`: the `Generator` trait, provider configs, factory
//! - `gemini` / `ollama`: HTTP provider implementations
//! - `retry`: `RetryPolicy` + `ResilientGenerator` (empty-on-exhaustion)
//! - `embedding`: `Embedder` trait + cosine similarity
//! - `json`: lenient JSON recovery for structured output

pub mod embedding;
mod gemini;
pub mod generator;
pub mod json;
mod ollama;
pub mod retry;

pub use embedding::{Embedder, OllamaEmbedder, SharedEmbedder, cosine_similarity};
pub use gemini::GeminiProvider;
pub use generator::{
    GenerationOptions, Generator, GeneratorConfig, SharedGenerator, create_generator,
};
pub use json::{extract_json_value, parse_lenient};
pub use ollama::OllamaProvider;
pub use retry::{ResilientGenerator, RetryPolicy};
