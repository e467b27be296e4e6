//! Raw per-page extraction records.
//!
//! These are what the PDF parser hands to the transformation pipeline: one
//! [`PdfResult`] per page, holding unclassified text blocks, table grids and
//! image payloads. The pipeline only ever reads them.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in PDF user-space points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

/// Raw extraction output for a single page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdfResult {
    /// Identifies the source document.
    pub file_path: String,
    /// 1-based page number.
    pub page: usize,
    /// Total pages in the source document.
    pub page_count: usize,
    /// Unstructured text layer of the page. Empty, never absent.
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub raw_tables: Vec<RawTable>,
    #[serde(default)]
    pub raw_images: Vec<RawImage>,
    #[serde(default)]
    pub raw_blocks: Vec<RawBlock>,
}

impl PdfResult {
    /// Create an empty record for page `page` of `page_count`.
    pub fn new(file_path: impl Into<String>, page: usize, page_count: usize) -> Self {
        Self {
            file_path: file_path.into(),
            page,
            page_count,
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.raw_text = text.into();
        self
    }

    pub fn with_block(mut self, block: RawBlock) -> Self {
        self.raw_blocks.push(block);
        self
    }

    pub fn with_table(mut self, table: RawTable) -> Self {
        self.raw_tables.push(table);
        self
    }

    pub fn with_image(mut self, image: RawImage) -> Self {
        self.raw_images.push(image);
        self
    }

    /// Check the `1 ≤ page ≤ page_count` invariant.
    pub fn validate(&self) -> Result<(), String> {
        if self.page == 0 {
            return Err("page numbers are 1-based, got 0".to_string());
        }
        if self.page > self.page_count {
            return Err(format!(
                "page {} exceeds page_count {}",
                self.page, self.page_count
            ));
        }
        Ok(())
    }
}

/// Structural marker attached to a text block by the parser.
///
/// A block carries exactly one hint, so every block lands in exactly one
/// element bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockHint {
    /// Ordinary body text.
    #[default]
    Plain,
    /// Heading of the given level (1–6). Level 0 means "not a heading".
    Heading { level: u8 },
    /// List item. `number` is the explicit ordinal for ordered lists, if known.
    ListItem {
        ordered: bool,
        #[serde(default)]
        number: Option<u32>,
        #[serde(default)]
        depth: u8,
    },
    /// Hyperlink whose display text is the block text.
    Link { url: String },
}

/// A typed text block in page order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlock {
    pub text: String,
    #[serde(default)]
    pub hint: BlockHint,
}

impl RawBlock {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            hint: BlockHint::Plain,
        }
    }

    pub fn heading(text: impl Into<String>, level: u8) -> Self {
        Self {
            text: text.into(),
            hint: BlockHint::Heading { level },
        }
    }

    pub fn bullet(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            hint: BlockHint::ListItem {
                ordered: false,
                number: None,
                depth: 0,
            },
        }
    }

    pub fn numbered(text: impl Into<String>, number: Option<u32>) -> Self {
        Self {
            text: text.into(),
            hint: BlockHint::ListItem {
                ordered: true,
                number,
                depth: 0,
            },
        }
    }

    pub fn link(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            hint: BlockHint::Link { url: url.into() },
        }
    }

    /// Set the nesting depth of a list item. No effect on other hints.
    pub fn nested(mut self, level: u8) -> Self {
        if let BlockHint::ListItem { ref mut depth, .. } = self.hint {
            *depth = level;
        }
        self
    }
}

/// A detected table as a grid of cell strings. Rows may be ragged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub rows: Vec<Vec<String>>,
    #[serde(default)]
    pub bbox: Option<BBox>,
    /// Index of the block this table precedes; `None` places it after all blocks.
    #[serde(default)]
    pub anchor: Option<usize>,
}

impl RawTable {
    pub fn new<R, C>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = C>,
        C: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
            bbox: None,
            anchor: None,
        }
    }

    pub fn anchored_at(mut self, block_index: usize) -> Self {
        self.anchor = Some(block_index);
        self
    }
}

/// An embedded image payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawImage {
    /// Raw encoded bytes (PNG, JPEG, …). Serialised as standard base64.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    /// Declared MIME type, if the parser knows it.
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub bbox: Option<BBox>,
    /// Index of the block this image precedes; `None` places it after all blocks.
    #[serde(default)]
    pub anchor: Option<usize>,
}

impl RawImage {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_bbox(mut self, bbox: BBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn anchored_at(mut self, block_index: usize) -> Self {
        self.anchor = Some(block_index);
        self
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_page_zero_and_overflow() {
        assert!(PdfResult::new("a.pdf", 0, 3).validate().is_err());
        assert!(PdfResult::new("a.pdf", 4, 3).validate().is_err());
        assert!(PdfResult::new("a.pdf", 3, 3).validate().is_ok());
    }

    #[test]
    fn record_json_uses_tagged_hints_and_base64_payloads() {
        let json = r#"{
            "file_path": "doc.pdf",
            "page": 1,
            "page_count": 1,
            "raw_blocks": [
                {"text": "Intro", "hint": {"kind": "heading", "level": 2}},
                {"text": "body"},
                {"text": "site", "hint": {"kind": "link", "url": "https://example.com"}},
                {"text": "step", "hint": {"kind": "list_item", "ordered": true}}
            ],
            "raw_images": [{"data": "iVBORw=="}]
        }"#;
        let record: PdfResult = serde_json::from_str(json).unwrap();
        assert_eq!(record.raw_text, "");
        assert_eq!(record.raw_blocks[0].hint, BlockHint::Heading { level: 2 });
        assert_eq!(record.raw_blocks[1].hint, BlockHint::Plain);
        assert_eq!(
            record.raw_blocks[3].hint,
            BlockHint::ListItem {
                ordered: true,
                number: None,
                depth: 0
            }
        );
        assert_eq!(record.raw_images[0].data, b"\x89PNG".to_vec());
    }

    #[test]
    fn nested_only_touches_list_items() {
        let item = RawBlock::bullet("x").nested(2);
        assert!(matches!(item.hint, BlockHint::ListItem { depth: 2, .. }));
        let heading = RawBlock::heading("h", 1).nested(2);
        assert_eq!(heading.hint, BlockHint::Heading { level: 1 });
    }

    #[test]
    fn raw_table_from_str_grid() {
        let t = RawTable::new(vec![vec!["a", "b"], vec!["c"]]).anchored_at(1);
        assert_eq!(t.rows[1], vec!["c".to_string()]);
        assert_eq!(t.anchor, Some(1));
    }
}
