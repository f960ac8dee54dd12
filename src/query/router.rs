//! Query Router
//!
//! Classifies a user query into one of four intent categories with a
//! single low-temperature generation call, and derives the retrieval
//! strategy from the configured per-route table. Any unrecognized or
//! failed classification falls back to `Conceptual` - a safe default,
//! not an error condition.

use regex::Regex;
use serde::Deserialize;
use std::str::FromStr;
use tracing::{debug, info};

use crate::ai::{GenerationOptions, ResilientGenerator, parse_lenient};
use crate::config::{RetrievalConfig, RetrievalStrategy};

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "of", "in", "on", "to", "for", "and", "or", "with",
    "what", "which", "how", "why", "when", "where", "does", "do", "can",
];

const MAX_KEYWORDS: usize = 5;

/// Query intent category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteType {
    /// Parameter/spec lookups (numbers, units, concrete values)
    Factual,
    /// Definitions and principles
    Conceptual,
    /// Cross-entity and causal questions
    Relational,
    /// Comparisons and differences
    Comparative,
}

impl FromStr for RouteType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "FACTUAL" => Ok(Self::Factual),
            "CONCEPTUAL" => Ok(Self::Conceptual),
            "RELATIONAL" => Ok(Self::Relational),
            "COMPARATIVE" => Ok(Self::Comparative),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for RouteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Factual => "FACTUAL",
            Self::Conceptual => "CONCEPTUAL",
            Self::Relational => "RELATIONAL",
            Self::Comparative => "COMPARATIVE",
        };
        f.write_str(label)
    }
}

/// Routing result: intent plus keywords for graph search.
#[derive(Debug, Clone)]
pub struct Route {
    pub route_type: RouteType,
    pub keywords: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RouterResponse {
    #[serde(default)]
    route_type: String,
    #[serde(default)]
    keywords: Vec<String>,
}

pub struct QueryRouter {
    generator: ResilientGenerator,
    strategies: RetrievalConfig,
}

impl QueryRouter {
    pub fn new(generator: ResilientGenerator, strategies: RetrievalConfig) -> Self {
        Self {
            generator,
            strategies,
        }
    }

    /// Classify a query. Failures and out-of-vocabulary labels fall back
    /// to `Conceptual`; missing keywords fall back to naive tokenization.
    pub async fn route(&self, query: &str) -> Route {
        let prompt = format!(
            "You are a routing expert for IC design and BCD process questions. \
             Classify the user query into exactly one category:\n\
             - \"FACTUAL\": asks for concrete process parameters, numbers, units, spec values\n\
             - \"RELATIONAL\": asks about cross-module impact, entity relationships, causality\n\
             - \"CONCEPTUAL\": asks for definitions, principles, explanations\n\
             - \"COMPARATIVE\": asks for comparisons or differences\n\n\
             User query: {}\n\n\
             Respond with JSON only:\n\
             {{\"route_type\": \"<one of FACTUAL|RELATIONAL|CONCEPTUAL|COMPARATIVE>\", \
             \"keywords\": [\"up to {} key terms from the query\"]}}",
            query, MAX_KEYWORDS
        );

        let response = self
            .generator
            .generate_text(&prompt, GenerationOptions::flash_deterministic())
            .await;

        let parsed: RouterResponse = parse_lenient(&response);
        let route_type = RouteType::from_str(&parsed.route_type).unwrap_or(RouteType::Conceptual);

        let mut keywords: Vec<String> = parsed
            .keywords
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .take(MAX_KEYWORDS)
            .collect();
        if keywords.is_empty() {
            keywords = naive_keywords(query);
            debug!("Router returned no keywords, using naive tokenization");
        }

        info!(route = %route_type, ?keywords, "Query routed");
        Route {
            route_type,
            keywords,
        }
    }

    /// Retrieval strategy for a route type, straight from configuration.
    pub fn strategy_for(&self, route_type: RouteType) -> &RetrievalStrategy {
        match route_type {
            RouteType::Factual => &self.strategies.factual,
            RouteType::Conceptual => &self.strategies.conceptual,
            RouteType::Relational => &self.strategies.relational,
            RouteType::Comparative => &self.strategies.comparative,
        }
    }
}

/// Fallback keyword extraction: split on non-word characters, drop
/// stopwords and single-character tokens.
pub fn naive_keywords(query: &str) -> Vec<String> {
    let splitter = Regex::new(r"[^\w]+").expect("static regex");
    splitter
        .split(query)
        .filter(|token| token.len() > 1)
        .filter(|token| !STOPWORDS.contains(&token.to_lowercase().as_str()))
        .take(MAX_KEYWORDS)
        .map(|token| token.to_string())
        .collect()
}
