//! Tiered Verification Pipeline
//!
//! Re-derives each chunk's content at a rigor level proportional to its
//! tier, fanning out over a bounded worker pool. Results are index-tagged
//! and re-sorted so output order always matches input order regardless of
//! completion order.
//!
//! Failure semantics: one chunk's failure never touches its siblings. A
//! failed (or empty-after-retries) generation falls back to the raw
//! content with `verification_passed = false`; the batch itself only
//! fails on cancellation.

use std::collections::HashMap;

use futures::StreamExt;
use tracing::{debug, info, warn};

use super::{CancelFlag, ProgressCallback};
use crate::ai::{GenerationOptions, ResilientGenerator};
use crate::config::RedPolicy;
use crate::pool::SharedPool;
use crate::types::{BlockKind, MergedChunk, Result, Tier, VerifiedChunk};

pub struct TieredVerifier {
    generator: ResilientGenerator,
    pool: SharedPool,
    red_policy: RedPolicy,
}

impl TieredVerifier {
    pub fn new(generator: ResilientGenerator, pool: SharedPool, red_policy: RedPolicy) -> Self {
        Self {
            generator,
            pool,
            red_policy,
        }
    }

    /// Verify a batch of chunks, preserving input order.
    pub async fn verify(
        &self,
        chunks: Vec<MergedChunk>,
        progress: Option<ProgressCallback>,
        cancel: &CancelFlag,
    ) -> Result<Vec<VerifiedChunk>> {
        let total = chunks.len();
        let mut tier_counts = [0usize; 3];
        for chunk in &chunks {
            tier_counts[match chunk.tier {
                Tier::Red => 0,
                Tier::Yellow => 1,
                Tier::Green => 2,
            }] += 1;
        }
        info!(
            "Verifying {} chunks (RED: {}, YELLOW: {}, GREEN: {}, workers: {})",
            total,
            tier_counts[0],
            tier_counts[1],
            tier_counts[2],
            self.pool.size()
        );

        let mut stream = futures::stream::iter(chunks.into_iter().enumerate())
            .map(|(idx, chunk)| async move { (idx, self.pool.run(self.verify_one(chunk)).await) })
            .buffer_unordered(self.pool.size());

        let mut tagged: Vec<(usize, VerifiedChunk)> = Vec::with_capacity(total);
        while let Some((idx, verified)) = stream.next().await {
            tagged.push((idx, verified));
            if let Some(callback) = &progress {
                callback(tagged.len(), total, &format!("verified chunk {}", idx + 1));
            }
            cancel.check()?;
        }
        drop(stream);

        // Restore original chunk order
        tagged.sort_by_key(|(idx, _)| *idx);
        Ok(tagged.into_iter().map(|(_, chunk)| chunk).collect())
    }

    /// Verify one chunk. Never fails: generation problems degrade to the
    /// raw-content fallback.
    async fn verify_one(&self, chunk: MergedChunk) -> VerifiedChunk {
        match self.derive_content(&chunk).await {
            // Pass-through tiers use the content as-is
            None => VerifiedChunk::passthrough(chunk),
            Some(text) if !text.is_empty() => VerifiedChunk::verified(chunk, text),
            // Empty after retries counts as a failed verification
            Some(_) => {
                warn!(
                    page = chunk.page,
                    tier = %chunk.tier,
                    "Verification produced no content, keeping raw content"
                );
                VerifiedChunk::failed(chunk)
            }
        }
    }

    /// Returns `None` for pass-through policies, otherwise the re-derived
    /// content (possibly empty on generation failure).
    async fn derive_content(&self, chunk: &MergedChunk) -> Option<String> {
        match (chunk.tier, chunk.kind) {
            (Tier::Red, _) => Some(self.verify_red(chunk).await),
            (Tier::Yellow, BlockKind::Table) => {
                debug!(page = chunk.page, "Table extraction");
                let prompt = format!(
                    "Parse the following process-parameter table (markdown) accurately. \
                     Extract the key parameters and their hierarchy:\n{}",
                    chunk.content
                );
                Some(
                    self.generator
                        .generate_text(&prompt, GenerationOptions::pro())
                        .await,
                )
            }
            (Tier::Yellow, BlockKind::Image) => {
                debug!(page = chunk.page, "Image transcription");
                let prompt = "Analyze this semiconductor-process image.\n\
                     1. If it is a table (ruled or unruled), transcribe it as a markdown table.\n\
                     2. If it is a circuit diagram, cross-section, or schematic, describe its \
                     structure, key parameters, and characteristics.\n\
                     3. If it is plain text, transcribe the text.";
                Some(
                    self.generator
                        .generate_multimodal(prompt, &chunk.content)
                        .await,
                )
            }
            // Remaining YELLOW content and everything GREEN passes through
            (Tier::Yellow, _) | (Tier::Green, _) => None,
        }
    }

    /// High-stakes technical content. Policy is configurable: one
    /// high-rigor call, or three calls with majority voting.
    async fn verify_red(&self, chunk: &MergedChunk) -> String {
        let prompt = format!(
            "As an IC/BCD process expert, parse and correct the wording of the \
             following technical content precisely, surfacing the key parameters:\n{}",
            chunk.content
        );

        match self.red_policy {
            RedPolicy::Single => {
                self.generator
                    .generate_text(&prompt, GenerationOptions::pro())
                    .await
            }
            RedPolicy::Majority => {
                let votes = futures::future::join_all((0..3).map(|_| {
                    self.generator
                        .generate_text(&prompt, GenerationOptions::pro())
                })).await;
                majority_answer(votes)
            }
        }
    }
}

/// Most frequent non-empty answer; the earliest answer wins ties.
fn majority_answer(votes: Vec<String>) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for vote in votes.iter().filter(|v| !v.is_empty()) {
        *counts.entry(vote.as_str()).or_default() += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for vote in votes.iter().filter(|v| !v.is_empty()) {
        let count = counts.get(vote.as_str()).copied().unwrap_or(0);
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((vote.as_str(), count));
        }
    }
    best.map(|(vote, _)| vote.to_string()).unwrap_or_default()
}
