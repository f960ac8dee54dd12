//! Triple Extraction
//!
//! Asks the model for `source, relation, target` lines with a framing
//! matched to the chunk's tier, then parses defensively: lines that do
//! not split into exactly three non-empty fields are discarded, never
//! partially persisted.

use tracing::debug;

use crate::ai::{GenerationOptions, ResilientGenerator};
use crate::types::{Tier, Triple};

pub struct TripleExtractor {
    generator: ResilientGenerator,
}

impl TripleExtractor {
    pub fn new(generator: ResilientGenerator) -> Self {
        Self { generator }
    }

    /// Extract triples from verified chunk content.
    pub async fn extract(&self, content: &str, tier: Tier) -> Vec<Triple> {
        let prompt = build_extraction_prompt(content, tier);
        let response = self
            .generator
            .generate_text(&prompt, GenerationOptions::pro())
            .await;

        let triples = parse_triples(&response);
        debug!(
            tier = %tier,
            extracted = triples.len(),
            "Triple extraction complete"
        );
        triples
    }
}

fn build_extraction_prompt(content: &str, tier: Tier) -> String {
    let framing = match tier {
        Tier::Red => {
            "You are an IC/BCD process expert. Extract the entities and the \
             relationships between them, focusing on process parameters, \
             their values, units, and constraints."
        }
        Tier::Yellow => {
            "You are an IC/BCD process expert. The text below is tabular or \
             figure-derived. Extract each record as entity relationships \
             between parameters, devices, and values."
        }
        Tier::Green => {
            "You are an IC/BCD process expert. Extract the general concepts \
             mentioned in the text and how they relate to each other."
        }
    };

    format!(
        "{}\n\nText:\n{}\n\nOutput one relationship per line in the form:\n\
         entity1, relation, entity2\n\n\
         Relation types include: Defined_in, Restricted_by, Has_property, \
         Connected_to, Used_in, etc.\n\
         Output only the extracted lines, with no other explanation.",
        framing, content
    )
}

/// Parse `source, relation, target` lines. Incomplete lines are dropped.
fn parse_triples(response: &str) -> Vec<Triple> {
    response
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let parts: Vec<&str> = line.split(',').collect();
            if parts.len() != 3 {
                debug!("Discarding malformed extraction line: {}", line);
                return None;
            }
            Triple::new(parts[0], parts[1], parts[2])
        })
        .collect()
}
