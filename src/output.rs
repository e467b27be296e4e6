//! Output types: per-page formatted records and run-level summaries.

use crate::config::PageSeparator;
use crate::error::{AlchemarkError, PageError};
use crate::model::{BBox, PdfResult};
use serde::{Deserialize, Serialize};

/// Language code used when detection is skipped or fails.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// A table with every row padded to the same column count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
    pub bbox: Option<BBox>,
}

impl Table {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.column_count() == 0
    }
}

/// A resolved image.
///
/// `base64_data` is populated only when images are kept inline; otherwise the
/// page text references the image by `hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    /// 1-based position among the page's raw images. Tells apart images that
    /// share a hash.
    pub number: usize,
    /// Lowercase hex MD5 of the raw payload.
    pub hash: String,
    pub mime_type: String,
    pub base64_data: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bbox: Option<BBox>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub text: String,
    pub url: String,
}

/// Per-page metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedMetadata {
    pub file_path: String,
    pub page: usize,
    pub page_count: usize,
    /// Character count of [`FormattedResult::text`]. Always computed from it.
    pub text_length: usize,
    /// Unix time (seconds) at which this page was assembled.
    pub processed_timestamp: f64,
}

/// Typed inventory of the structural elements found on a page.
///
/// Every list keeps first-seen order. Only `images` is de-duplicated (by hash).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormattedElements {
    pub tables: Vec<Table>,
    pub images: Vec<Image>,
    pub titles: Vec<String>,
    pub lists: Vec<String>,
    pub links: Vec<Link>,
}

impl FormattedElements {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
            && self.images.is_empty()
            && self.titles.is_empty()
            && self.lists.is_empty()
            && self.links.is_empty()
    }
}

/// The final, immutable record for one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedResult {
    metadata: FormattedMetadata,
    elements: FormattedElements,
    text: String,
    tokens: usize,
    language: String,
}

impl FormattedResult {
    /// Assemble a page result. `text_length` is derived from `text` here and
    /// nowhere else.
    pub(crate) fn new(
        source: &PdfResult,
        processed_timestamp: f64,
        elements: FormattedElements,
        text: String,
        tokens: usize,
        language: String,
    ) -> Self {
        let metadata = FormattedMetadata {
            file_path: source.file_path.clone(),
            page: source.page,
            page_count: source.page_count,
            text_length: text.chars().count(),
            processed_timestamp,
        };
        Self {
            metadata,
            elements,
            text,
            tokens,
            language,
        }
    }

    pub fn metadata(&self) -> &FormattedMetadata {
        &self.metadata
    }

    pub fn elements(&self) -> &FormattedElements {
        &self.elements
    }

    /// Rendered Markdown for the page.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> usize {
        self.tokens
    }

    /// ISO 639-1 code, or [`UNKNOWN_LANGUAGE`].
    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn page(&self) -> usize {
        self.metadata.page
    }
}

/// Document-level PDF metadata, as reported by pdfium.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// Counters and timings for one conversion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    /// Pages in the source document (or records supplied).
    pub total_pages: usize,
    pub processed_pages: usize,
    pub failed_pages: usize,
    /// Selected pages never scheduled because the run was cancelled.
    pub skipped_pages: usize,
    pub total_tokens: u64,
    pub total_duration_ms: u64,
    pub extract_duration_ms: u64,
    pub transform_duration_ms: u64,
}

/// Result of a whole conversion run.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// Successful pages in increasing page order.
    pub pages: Vec<FormattedResult>,
    /// Pages that could not be produced, in increasing page order.
    pub failures: Vec<PageError>,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// Join every page's text into one Markdown document.
    pub fn markdown(&self, separator: &PageSeparator) -> String {
        let mut out = String::new();
        for (i, page) in self.pages.iter().enumerate() {
            if i > 0 {
                out.push_str(&separator.render(page.page()));
            }
            out.push_str(page.text());
        }
        out
    }

    /// Treat any page failure as an error.
    pub fn into_result(self) -> Result<Vec<FormattedResult>, AlchemarkError> {
        if self.failures.is_empty() {
            Ok(self.pages)
        } else {
            Err(AlchemarkError::PartialFailure {
                success: self.pages.len(),
                failed: self.failures.len(),
                total: self.pages.len() + self.failures.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: usize, text: &str) -> FormattedResult {
        FormattedResult::new(
            &PdfResult::new("doc.pdf", n, 2),
            0.0,
            FormattedElements::default(),
            text.into(),
            0,
            UNKNOWN_LANGUAGE.into(),
        )
    }

    #[test]
    fn text_length_counts_chars_not_bytes() {
        let r = page(1, "héllo ✓");
        assert_eq!(r.metadata().text_length, 7);
        assert_eq!(page(1, "").metadata().text_length, 0);
    }

    #[test]
    fn table_dimensions() {
        let t = Table {
            rows: vec![vec!["a".into(), "b".into()], vec!["c".into(), String::new()]],
            bbox: None,
        };
        assert_eq!(t.row_count(), 2);
        assert_eq!(t.column_count(), 2);
        assert!(!t.is_empty());
    }

    #[test]
    fn markdown_joins_with_separator() {
        let out = ConversionOutput {
            pages: vec![page(1, "one"), page(2, "two")],
            failures: vec![],
            stats: ConversionStats::default(),
        };
        assert_eq!(out.markdown(&PageSeparator::None), "one\n\ntwo");
        assert_eq!(
            out.markdown(&PageSeparator::Comment),
            "one\n\n<!-- page 2 -->\n\ntwo"
        );
    }

    #[test]
    fn into_result_flags_partial_failure() {
        let out = ConversionOutput {
            pages: vec![page(1, "one")],
            failures: vec![PageError::ExtractionFailed {
                page: 2,
                detail: "x".into(),
            }],
            stats: ConversionStats::default(),
        };
        match out.into_result() {
            Err(AlchemarkError::PartialFailure { failed, total, .. }) => {
                assert_eq!((failed, total), (1, 2));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn formatted_result_serialises_spec_field_names() {
        let json = serde_json::to_value(page(1, "hi")).unwrap();
        assert_eq!(json["metadata"]["text_length"], 2);
        assert_eq!(json["language"], "unknown");
        assert!(json["elements"]["tables"].is_array());
    }
}
