//! Content Block Data Model
//!
//! The ingestion pipeline is a linear ownership chain:
//! `RawBlock` (parser output) -> `MergedChunk` (after merging/classification)
//! -> `VerifiedChunk` (after tiered verification). Each stage consumes the
//! previous one; nothing is shared.

use serde::{Deserialize, Serialize};

// =============================================================================
// Reliability Tier
// =============================================================================

/// Reliability tier controlling how much verification effort a chunk gets.
///
/// Ordered RED > YELLOW > GREEN. Tiers may be upgraded during merging
/// (table detection) but never downgraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Green,
    Yellow,
    Red,
}

impl Tier {
    /// Upgrade-only combination: the higher of the two tiers wins.
    pub fn upgraded_to(self, other: Tier) -> Tier {
        self.max(other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Red => "RED",
            Tier::Yellow => "YELLOW",
            Tier::Green => "GREEN",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Block Kind & Geometry
// =============================================================================

/// Structural kind of a content block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Text,
    Table,
    Image,
    /// Merged text whose line structure looks tabular (detected heuristically)
    PotentialTable,
    Unknown,
}

impl BlockKind {
    /// Tables and images are never merged with surrounding text.
    pub fn is_mergeable(&self) -> bool {
        !matches!(self, BlockKind::Table | BlockKind::Image)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Text => "text",
            BlockKind::Table => "table",
            BlockKind::Image => "image",
            BlockKind::PotentialTable => "potential_table",
            BlockKind::Unknown => "unknown",
        }
    }
}

/// Bounding box of a block on its source page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

// =============================================================================
// Pipeline Stages
// =============================================================================

/// A single content block as produced by the external document parser,
/// normalized to this fixed shape by the adapter. Image content is the
/// base64-encoded image payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBlock {
    pub kind: BlockKind,
    pub page: u32,
    pub content: String,
    #[serde(default)]
    pub coordinates: BBox,
}

impl RawBlock {
    pub fn text(page: u32, content: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Text,
            page,
            content: content.into(),
            coordinates: BBox::default(),
        }
    }
}

/// One or more consecutive raw blocks coalesced into a coherent unit.
///
/// Invariants: never spans two pages, merged text never exceeds the
/// configured size limit, and tables/images are always standalone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedChunk {
    pub kind: BlockKind,
    pub page: u32,
    pub content: String,
    pub tier: Tier,
    #[serde(default)]
    pub coordinates: BBox,
}

/// A merged chunk after tiered verification. `verified_content` is the
/// authoritative text for embedding, graph extraction, and context
/// assembly; on verification failure it falls back to the raw content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedChunk {
    #[serde(flatten)]
    pub chunk: MergedChunk,
    pub verified_content: String,
    pub verification_passed: bool,
}

impl VerifiedChunk {
    /// Pass-through verification: content is used as-is.
    pub fn passthrough(chunk: MergedChunk) -> Self {
        let verified_content = chunk.content.clone();
        Self {
            chunk,
            verified_content,
            verification_passed: true,
        }
    }

    /// Failed verification: raw content fallback, flagged as unverified.
    pub fn failed(chunk: MergedChunk) -> Self {
        let verified_content = chunk.content.clone();
        Self {
            chunk,
            verified_content,
            verification_passed: false,
        }
    }

    pub fn verified(chunk: MergedChunk, verified_content: String) -> Self {
        Self {
            chunk,
            verified_content,
            verification_passed: true,
        }
    }
}
