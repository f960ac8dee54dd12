//! Context Analysis & Answer Generation
//!
//! ANALYZE produces a structured extraction over the retrieved contexts;
//! the response is requested as JSON and parsed with per-field defaults so
//! a malformed model reply degrades to an empty analysis, never an error.
//! GENERATE answers strictly from the provided context and is wrapped
//! with an enumerated reference list built from the same ordered context
//! list (reference index = 1-based position).

use serde::Deserialize;
use tracing::debug;

use crate::ai::{GenerationOptions, ResilientGenerator, parse_lenient};
use crate::types::{RetrievedContext, render_context_text};

/// Structured context analysis. Every field degrades independently.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContextAnalysis {
    pub key_information: Vec<String>,
    pub context_summary: String,
    pub context_relations: Vec<String>,
    pub information_gaps: String,
}

impl Default for ContextAnalysis {
    fn default() -> Self {
        Self {
            key_information: Vec::new(),
            context_summary: String::new(),
            context_relations: Vec::new(),
            information_gaps: "none".to_string(),
        }
    }
}

pub struct ContextAnalyzer {
    generator: ResilientGenerator,
}

impl ContextAnalyzer {
    pub fn new(generator: ResilientGenerator) -> Self {
        Self { generator }
    }

    /// Analyze retrieved contexts in preparation for answering.
    pub async fn analyze(
        &self,
        query: &str,
        contexts: &[RetrievedContext],
    ) -> ContextAnalysis {
        let prompt = format!(
            "You are a senior IC design and BCD process expert. Analyze the \
             following context to prepare for answering the user's question.\n\n\
             User question: {}\n\n\
             Context:\n{}\n\n\
             Tasks:\n\
             1. Extract the key information directly relevant to the question\n\
             2. Summarize the core content of the context\n\
             3. Identify relationships between the context passages\n\
             4. Point out information gaps, if any\n\n\
             Respond with JSON only:\n\
             {{\"key_information\": [\"...\"], \"context_summary\": \"...\", \
             \"context_relations\": [\"...\"], \"information_gaps\": \"... or 'none'\"}}",
            query,
            render_context_text(contexts)
        );

        let response = self
            .generator
            .generate_text(&prompt, GenerationOptions::pro())
            .await;
        let analysis: ContextAnalysis = parse_lenient(&response);
        debug!(
            key_points = analysis.key_information.len(),
            relations = analysis.context_relations.len(),
            "Context analysis complete"
        );
        analysis
    }

    /// Generate an answer strictly grounded in the context and analysis.
    pub async fn generate_answer(
        &self,
        query: &str,
        contexts: &[RetrievedContext],
        analysis: &ContextAnalysis,
    ) -> String {
        let key_information = bullet_list(&analysis.key_information);
        let context_relations = bullet_list(&analysis.context_relations);

        let prompt = format!(
            "You are a senior IC design and BCD process expert. Answer the \
             user's question based on the context below.\n\n\
             User question: {}\n\n\
             Context:\n{}\n\n\
             Context analysis:\n\
             Key information:\n{}\n\n\
             Summary:\n{}\n\n\
             Relations:\n{}\n\n\
             Information gaps:\n{}\n\n\
             Requirements:\n\
             1. Answer strictly from the provided context; add no outside information\n\
             2. Be accurate, detailed, and professional\n\
             3. Use a clear structure\n\
             4. Cite the relevant context sources\n\
             5. Be exact with numbers, units, and terminology\n\
             6. If the context is insufficient, say so explicitly",
            query,
            render_context_text(contexts),
            key_information,
            analysis.context_summary,
            context_relations,
            analysis.information_gaps
        );

        self.generator
            .generate_text(&prompt, GenerationOptions::pro())
            .await
    }

    /// Wrap an answer with its enumerated reference list. Reference index
    /// is the 1-based position in the ordered retrieved-context list.
    pub fn format_with_references(
        &self,
        answer: &str,
        contexts: &[RetrievedContext],
    ) -> String {
        if contexts.is_empty() {
            return answer.to_string();
        }

        let references = contexts
            .iter()
            .enumerate()
            .map(|(i, ctx)| {
                format!(
                    "[{}] {}, page {}",
                    i + 1,
                    ctx.metadata.file_name,
                    ctx.metadata.page
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!("{}\n\n---\n\n**References:**\n{}", answer, references)
    }
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "(none)".to_string();
    }
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}
