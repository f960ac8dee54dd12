//! Chunk Merger
//!
//! Coalesces consecutive parser blocks into coherent chunks. Flush
//! triggers, each closing the current buffer into one `MergedChunk`:
//!
//! 1. Page change - a chunk never spans two pages.
//! 2. Non-mergeable kind - tables and images stay standalone.
//! 3. Size limit - merged text never exceeds `max_chars`.
//! 4. Semantic break - consecutive blocks whose embeddings fall below the
//!    similarity threshold are split even when they fit the size budget.
//!
//! The embedder is optional. If it is absent or a call fails, semantic
//! splitting is silently disabled and the merger degrades to
//! structural/size-based splitting - merging itself must never fail.

use regex::Regex;
use tracing::debug;

use super::classifier::TierClassifier;
use crate::ai::{Embedder, SharedEmbedder, cosine_similarity};
use crate::config::IngestConfig;
use crate::constants::merger as consts;
use crate::types::{BBox, BlockKind, MergedChunk, RawBlock, Tier};

pub struct ChunkMerger {
    max_chars: usize,
    semantic_threshold: f32,
    classifier: TierClassifier,
    embedder: Option<SharedEmbedder>,
    table_row_re: Regex,
}

struct Buffer {
    fragments: Vec<String>,
    len: usize,
    page: u32,
    coordinates: BBox,
    last_embedding: Option<Vec<f32>>,
}

impl Buffer {
    fn new() -> Self {
        Self {
            fragments: Vec::new(),
            len: 0,
            page: 1,
            coordinates: BBox::default(),
            last_embedding: None,
        }
    }

    fn push(&mut self, block: &RawBlock, embedding: Option<Vec<f32>>) {
        if self.fragments.is_empty() {
            self.page = block.page;
            self.coordinates = block.coordinates;
        }
        self.len += block.content.len() + 1;
        self.fragments.push(block.content.clone());
        self.last_embedding = embedding;
    }
}

impl ChunkMerger {
    pub fn new(
        config: &IngestConfig,
        classifier: TierClassifier,
        embedder: Option<SharedEmbedder>,
    ) -> Self {
        Self {
            max_chars: config.max_chars,
            semantic_threshold: config.semantic_threshold,
            classifier,
            embedder,
            // Lines like "Parameter  Value  Unit" - runs of 2+ spaces
            // between tokens
            table_row_re: Regex::new(r"(\S+\s{2,}){2,}\S+").expect("static regex"),
        }
    }

    /// Merge an ordered block sequence into ordered chunks.
    pub async fn merge(&self, blocks: Vec<RawBlock>) -> Vec<MergedChunk> {
        let total = blocks.len();
        let mut chunks = Vec::new();
        let mut buffer = Buffer::new();
        // Set once an embedding call fails; checked to avoid hammering a
        // broken endpoint for every remaining block
        let mut embedder_down = self.embedder.is_none();

        for block in blocks {
            // Structural break: page turn
            if !buffer.fragments.is_empty() && block.page != buffer.page {
                self.flush(&mut chunks, &mut buffer);
            }

            // Tables and images are standalone chunks
            if !block.kind.is_mergeable() {
                self.flush(&mut chunks, &mut buffer);
                chunks.push(MergedChunk {
                    kind: block.kind,
                    page: block.page,
                    content: block.content,
                    tier: Tier::Yellow,
                    coordinates: block.coordinates,
                });
                continue;
            }

            // A single block larger than the budget is split outright so
            // the size invariant holds for every merged chunk
            if block.content.len() > self.max_chars {
                self.flush(&mut chunks, &mut buffer);
                for piece in split_oversized(&block.content, self.max_chars) {
                    let mut piece_block = block.clone();
                    piece_block.content = piece;
                    buffer.push(&piece_block, None);
                    self.flush(&mut chunks, &mut buffer);
                }
                continue;
            }

            // Size limit
            if !buffer.fragments.is_empty() && buffer.len + block.content.len() > self.max_chars {
                self.flush(&mut chunks, &mut buffer);
            }

            // Semantic break against the last buffered fragment
            let mut embedding = None;
            if !embedder_down {
                match self.embed(&block.content).await {
                    Some(vector) => {
                        if let Some(last) = &buffer.last_embedding {
                            let similarity = cosine_similarity(last, &vector);
                            if similarity < self.semantic_threshold {
                                debug!(
                                    similarity,
                                    page = block.page,
                                    "Semantic break, flushing buffer"
                                );
                                self.flush(&mut chunks, &mut buffer);
                            }
                        }
                        embedding = Some(vector);
                    }
                    None => {
                        debug!("Embedder unavailable, semantic splitting disabled");
                        embedder_down = true;
                    }
                }
            }

            buffer.push(&block, embedding);
        }

        self.flush(&mut chunks, &mut buffer);

        debug!("Merged {} raw blocks into {} chunks", total, chunks.len());
        chunks
    }

    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(text).await {
            Ok(vector) if !vector.is_empty() => Some(vector),
            Ok(_) => None,
            Err(e) => {
                debug!("Embedding call failed during merge: {}", e);
                None
            }
        }
    }

    fn flush(&self, chunks: &mut Vec<MergedChunk>, buffer: &mut Buffer) {
        if buffer.fragments.is_empty() {
            return;
        }

        let content = buffer.fragments.join("\n");
        let mut tier = self.classifier.classify(&content);
        let mut kind = BlockKind::Text;

        if self.looks_like_table(&content) {
            kind = BlockKind::PotentialTable;
            tier = tier.upgraded_to(Tier::Yellow);
        }

        chunks.push(MergedChunk {
            kind,
            page: buffer.page,
            content,
            tier,
            coordinates: buffer.coordinates,
        });

        *buffer = Buffer::new();
    }

    /// A line is table-like if it has 2+ runs of multi-space separation or
    /// at least 3 whitespace-separated tokens each containing a digit.
    fn is_table_row(&self, line: &str) -> bool {
        if line.len() < consts::TABLE_ROW_MIN_CHARS {
            return false;
        }
        if self.table_row_re.is_match(line) {
            return true;
        }
        let digit_tokens = line
            .split_whitespace()
            .filter(|token| token.chars().any(|c| c.is_ascii_digit()))
            .count();
        digit_tokens >= 3
    }

    fn looks_like_table(&self, content: &str) -> bool {
        let lines: Vec<&str> = content.lines().collect();
        if lines.len() <= consts::TABLE_MIN_LINES {
            return false;
        }
        let table_like = lines.iter().filter(|line| self.is_table_row(line)).count();
        (table_like as f32 / lines.len() as f32) > consts::TABLE_LINE_RATIO
    }
}

/// Split text into pieces of at most `max_chars` bytes on char boundaries.
fn split_oversized(content: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for ch in content.chars() {
        if current.len() + ch.len_utf8() > max_chars {
            pieces.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::Embedder;
    use crate::types::{Result, WaferError};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn merger() -> ChunkMerger {
        ChunkMerger::new(&IngestConfig::default(), TierClassifier::default(), None)
    }

    fn merger_with(config: IngestConfig, embedder: Option<SharedEmbedder>) -> ChunkMerger {
        ChunkMerger::new(&config, TierClassifier::default(), embedder)
    }

    /// Embedder returning fixed vectors keyed by content marker.
    struct KeyedEmbedder {
        fail: AtomicBool,
    }

    #[async_trait]
    impl Embedder for KeyedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(WaferError::Embedding("down".to_string()));
            }
            // "alpha" topics point one way, "beta" topics the other
            if text.contains("beta") {
                Ok(vec![0.0, 1.0])
            } else {
                Ok(vec![1.0, 0.0])
            }
        }

        fn name(&self) -> &str {
            "keyed"
        }
    }

    #[tokio::test]
    async fn test_consecutive_text_merges() {
        let chunks = merger()
            .merge(vec![
                RawBlock::text(1, "first paragraph"),
                RawBlock::text(1, "second paragraph"),
            ])
            .await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "first paragraph\nsecond paragraph");
    }

    #[tokio::test]
    async fn test_page_change_flushes() {
        let chunks = merger()
            .merge(vec![RawBlock::text(1, "page one"), RawBlock::text(2, "page two")])
            .await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page, 1);
        assert_eq!(chunks[1].page, 2);
    }

    #[tokio::test]
    async fn test_table_block_is_standalone() {
        let mut table = RawBlock::text(1, "a | b | c");
        table.kind = BlockKind::Table;
        let chunks = merger()
            .merge(vec![
                RawBlock::text(1, "before"),
                table,
                RawBlock::text(1, "after"),
            ])
            .await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].kind, BlockKind::Table);
        assert_eq!(chunks[1].tier, Tier::Yellow);
    }

    #[tokio::test]
    async fn test_size_limit_flushes() {
        let config = IngestConfig {
            max_chars: 20,
            ..Default::default()
        };
        let chunks = merger_with(config, None)
            .merge(vec![
                RawBlock::text(1, "0123456789012345"),
                RawBlock::text(1, "next block"),
            ])
            .await;
        assert_eq!(chunks.len(), 2);
        for chunk in &chunks {
            assert!(chunk.content.len() <= 20);
        }
    }

    #[tokio::test]
    async fn test_semantic_break_splits_unrelated_paragraphs() {
        let embedder: SharedEmbedder = Arc::new(KeyedEmbedder {
            fail: AtomicBool::new(false),
        });
        let chunks = merger_with(IngestConfig::default(), Some(embedder))
            .merge(vec![
                RawBlock::text(1, "alpha topic sentence"),
                RawBlock::text(1, "beta topic sentence"),
            ])
            .await;
        assert_eq!(chunks.len(), 2);
    }

    #[tokio::test]
    async fn test_similar_blocks_stay_merged_under_embedder() {
        let embedder: SharedEmbedder = Arc::new(KeyedEmbedder {
            fail: AtomicBool::new(false),
        });
        let chunks = merger_with(IngestConfig::default(), Some(embedder))
            .merge(vec![
                RawBlock::text(1, "alpha topic sentence"),
                RawBlock::text(1, "more alpha detail"),
            ])
            .await;
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn test_embedder_failure_degrades_silently() {
        let embedder: SharedEmbedder = Arc::new(KeyedEmbedder {
            fail: AtomicBool::new(true),
        });
        let chunks = merger_with(IngestConfig::default(), Some(embedder))
            .merge(vec![
                RawBlock::text(1, "alpha topic"),
                RawBlock::text(1, "beta topic"),
            ])
            .await;
        // Structural merging still works, no semantic split
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn test_potential_table_detection_upgrades_tier() {
        let rows = "Param  Min  Max\nVth  0.6  0.8\nBV  55  65\nIdss  1  2";
        let chunks = merger().merge(vec![RawBlock::text(1, rows)]).await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, BlockKind::PotentialTable);
        assert!(chunks[0].tier >= Tier::Yellow);
    }

    #[tokio::test]
    async fn test_red_classification_survives_table_detection() {
        let rows = "Breakdown Voltage  Min  Max\nBV  55  65\nVth  0.6  0.8\nIdss  1  2";
        let chunks = merger().merge(vec![RawBlock::text(1, rows)]).await;
        // RED from keywords is never downgraded by the table heuristic
        assert_eq!(chunks[0].tier, Tier::Red);
    }

    #[tokio::test]
    async fn test_oversized_block_is_split() {
        let config = IngestConfig {
            max_chars: 10,
            ..Default::default()
        };
        let chunks = merger_with(config, None)
            .merge(vec![RawBlock::text(1, "abcdefghijklmnopqrstuvwx")])
            .await;
        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(chunk.content.len() <= 10);
        }
        let rejoined: String = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(rejoined, "abcdefghijklmnopqrstuvwx");
    }

    #[tokio::test]
    async fn test_short_prose_is_not_a_table() {
        let chunks = merger()
            .merge(vec![RawBlock::text(1, "An ordinary sentence about the process.")])
            .await;
        assert_eq!(chunks[0].kind, BlockKind::Text);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_block() -> impl Strategy<Value = RawBlock> {
            ("[a-z ]{1,80}", 1u32..4u32, prop::bool::ANY).prop_map(|(text, page, is_table)| {
                let mut block = RawBlock::text(page, text);
                if is_table {
                    block.kind = BlockKind::Table;
                }
                block
            })
        }

        proptest! {
            #[test]
            fn merged_chunks_never_span_pages(blocks in prop::collection::vec(arb_block(), 0..30)) {
                let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
                let source_pages: Vec<(u32, String)> =
                    blocks.iter().map(|b| (b.page, b.content.clone())).collect();
                let chunks = rt.block_on(merger().merge(blocks));
                for chunk in &chunks {
                    // Every source fragment of the chunk came from the chunk's page
                    for fragment in chunk.content.split('\n') {
                        let on_page = source_pages
                            .iter()
                            .any(|(page, content)| *page == chunk.page && content.contains(fragment));
                        prop_assert!(on_page);
                    }
                }
            }

            #[test]
            fn merged_text_respects_size_bound(blocks in prop::collection::vec(arb_block(), 0..30)) {
                let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
                let max_chars = IngestConfig::default().max_chars;
                let chunks = rt.block_on(merger().merge(blocks));
                for chunk in &chunks {
                    if chunk.kind != BlockKind::Table && chunk.kind != BlockKind::Image {
                        prop_assert!(chunk.content.len() <= max_chars);
                    }
                }
            }
        }
    }
}
