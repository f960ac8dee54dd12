//! Parser Boundary Adapter
//!
//! The structural PDF parser is an external collaborator. It hands over
//! loosely-shaped block objects whose field names vary across parser
//! versions; `normalize_block` is the single place where that shape
//! probing happens. Everything downstream sees only the fixed `RawBlock`.

use serde_json::Value;
use tracing::debug;

use crate::types::{BBox, BlockKind, RawBlock, Result, WaferError};

/// External document parser: bytes in, ordered raw blocks out.
///
/// A parse failure here is the one hard failure of ingestion - there is
/// nothing to fall back to.
pub trait BlockSource: Send + Sync {
    fn parse(&self, bytes: &[u8], file_name: &str) -> Result<Vec<RawBlock>>;
}

/// Field names probed for block content, in priority order.
const CONTENT_FIELDS: &[&str] = &[
    "content",
    "text",
    "text_content",
    "full_text",
    "string_value",
    "value",
    "data",
];

/// Normalize one loosely-shaped parser block into a `RawBlock`.
///
/// Returns `None` when no usable content is found; such blocks are
/// dropped, matching the parser's own behavior for decorative elements.
pub fn normalize_block(value: &Value) -> Option<RawBlock> {
    let kind = match value
        .get("type")
        .or_else(|| value.get("kind"))
        .and_then(Value::as_str)
    {
        Some("table") => BlockKind::Table,
        Some("image") | Some("picture") => BlockKind::Image,
        Some("text") | Some("paragraph") | Some("heading") => BlockKind::Text,
        _ => BlockKind::Unknown,
    };

    let page = value
        .get("page")
        .or_else(|| value.get("page_no"))
        .and_then(Value::as_u64)
        .unwrap_or(1) as u32;

    let content = CONTENT_FIELDS
        .iter()
        .find_map(|field| value.get(field).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())?
        .to_string();

    // A block with text content but an unknown label is treated as text
    let kind = if kind == BlockKind::Unknown {
        BlockKind::Text
    } else {
        kind
    };

    let coordinates = value
        .get("coordinates")
        .or_else(|| value.get("bbox"))
        .map(read_bbox)
        .unwrap_or_default();

    Some(RawBlock {
        kind,
        page,
        content,
        coordinates,
    })
}

fn read_bbox(value: &Value) -> BBox {
    let field = |name: &str| value.get(name).and_then(Value::as_f64).unwrap_or(0.0) as f32;
    BBox {
        x1: field("x1"),
        y1: field("y1"),
        x2: field("x2"),
        y2: field("y2"),
    }
}

// =============================================================================
// JSON Block Source
// =============================================================================

/// Block source reading a JSON array of parser blocks, the exchange format
/// produced by the external PDF parsing step.
#[derive(Default)]
pub struct JsonBlockSource;

impl JsonBlockSource {
    pub fn new() -> Self {
        Self
    }
}

impl BlockSource for JsonBlockSource {
    fn parse(&self, bytes: &[u8], file_name: &str) -> Result<Vec<RawBlock>> {
        let values: Vec<Value> = serde_json::from_slice(bytes)
            .map_err(|e| WaferError::parse(file_name, format!("invalid block JSON: {}", e)))?;

        let total = values.len();
        let blocks: Vec<RawBlock> = values.iter().filter_map(normalize_block).collect();
        if blocks.len() < total {
            debug!(
                "Dropped {} of {} parser blocks with no usable content",
                total - blocks.len(),
                total
            );
        }

        if blocks.is_empty() {
            return Err(WaferError::parse(
                file_name,
                "document produced no content blocks",
            ));
        }

        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_standard_shape() {
        let block = normalize_block(&json!({
            "type": "text",
            "page": 2,
            "content": "Breakdown Voltage = 60V",
            "coordinates": {"x1": 1.0, "y1": 2.0, "x2": 3.0, "y2": 4.0}
        }))
        .unwrap();
        assert_eq!(block.kind, BlockKind::Text);
        assert_eq!(block.page, 2);
        assert_eq!(block.coordinates.x2, 3.0);
    }

    #[test]
    fn test_normalize_probes_alternate_field_names() {
        let block = normalize_block(&json!({
            "kind": "paragraph",
            "page_no": 3,
            "text_content": "some text",
            "bbox": {"x1": 5.0}
        }))
        .unwrap();
        assert_eq!(block.page, 3);
        assert_eq!(block.content, "some text");
        assert_eq!(block.coordinates.x1, 5.0);
    }

    #[test]
    fn test_normalize_unknown_kind_with_text_becomes_text() {
        let block = normalize_block(&json!({"content": "orphan"})).unwrap();
        assert_eq!(block.kind, BlockKind::Text);
        assert_eq!(block.page, 1);
    }

    #[test]
    fn test_normalize_drops_contentless_blocks() {
        assert!(normalize_block(&json!({"type": "text", "page": 1})).is_none());
        assert!(normalize_block(&json!({"type": "text", "content": "   "})).is_none());
    }

    #[test]
    fn test_picture_maps_to_image() {
        let block = normalize_block(&json!({
            "type": "picture",
            "content": "aGVsbG8="
        }))
        .unwrap();
        assert_eq!(block.kind, BlockKind::Image);
    }

    #[test]
    fn test_json_source_rejects_empty_documents() {
        let source = JsonBlockSource::new();
        assert!(source.parse(b"[]", "empty.pdf").is_err());
        assert!(source.parse(b"not json", "bad.pdf").is_err());
    }

    #[test]
    fn test_json_source_parses_array() {
        let source = JsonBlockSource::new();
        let bytes = serde_json::to_vec(&json!([
            {"type": "text", "page": 1, "content": "hello"},
            {"type": "table", "page": 1, "content": "a | b"}
        ]))
        .unwrap();
        let blocks = source.parse(&bytes, "doc.pdf").unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].kind, BlockKind::Table);
    }
}
