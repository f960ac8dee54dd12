//! Retrieved Context Model
//!
//! A `RetrievedContext` is one unit of evidence surfaced by any retrieval
//! method (vector, exact match, graph, table, image). The same underlying
//! content can be surfaced by more than one method, so deduplication keys
//! on `(content, file_name, page)` rather than on id.

use serde::{Deserialize, Serialize};

use super::block::{BBox, Tier};

/// Metadata carried alongside every indexed chunk and returned with search
/// results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextMetadata {
    pub file_name: String,
    pub page: u32,
    /// Block kind as stored ("text", "table", "image", "graph_data", ...)
    pub kind: String,
    pub tier: Tier,
    #[serde(default)]
    pub coordinates: BBox,
    /// The verified content that was embedded
    pub content: String,
    /// Base64 image payload, present only for image chunks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
}

/// One retrieval hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub score: f32,
    pub id: String,
    pub metadata: ContextMetadata,
}

impl RetrievedContext {
    /// Composite key used to deduplicate hits across retrieval methods.
    pub fn dedup_key(&self) -> (String, String, u32) {
        (
            self.metadata.content.clone(),
            self.metadata.file_name.clone(),
            self.metadata.page,
        )
    }
}

/// Render contexts as a source-attributed text body for prompts.
pub fn render_context_text(contexts: &[RetrievedContext]) -> String {
    contexts
        .iter()
        .map(|ctx| {
            format!(
                "[Source: {}, page {}]\n{}",
                ctx.metadata.file_name, ctx.metadata.page, ctx.metadata.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(content: &str, file: &str, page: u32) -> RetrievedContext {
        RetrievedContext {
            score: 0.9,
            id: "x".to_string(),
            metadata: ContextMetadata {
                file_name: file.to_string(),
                page,
                kind: "text".to_string(),
                tier: Tier::Green,
                coordinates: BBox::default(),
                content: content.to_string(),
                image_base64: None,
            },
        }
    }

    #[test]
    fn test_dedup_key_ignores_id_and_score() {
        let a = ctx("same", "f.pdf", 1);
        let mut b = ctx("same", "f.pdf", 1);
        b.id = "y".to_string();
        b.score = 0.1;
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_dedup_key_distinguishes_pages() {
        assert_ne!(ctx("same", "f.pdf", 1).dedup_key(), ctx("same", "f.pdf", 2).dedup_key());
    }

    #[test]
    fn test_render_context_text() {
        let text = render_context_text(&[ctx("Vth = 0.7V", "spec.pdf", 3)]);
        assert!(text.contains("[Source: spec.pdf, page 3]"));
        assert!(text.contains("Vth = 0.7V"));
    }
}
