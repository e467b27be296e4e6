//! Error types for the alchemark library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`AlchemarkError`] — **Fatal**: the conversion cannot proceed at all
//!   (bad input file, wrong password, no pages to transform). Returned as
//!   `Err(AlchemarkError)` from the top-level `convert*` / `format*` functions.
//!
//! * [`PageError`] — **Non-fatal**: a single page could not be produced
//!   (the parser failed on it, the record is malformed, its worker died) but
//!   every other page is fine. Collected in
//!   [`crate::output::ConversionOutput::failures`]; the failed page leaves a
//!   gap in the output page sequence instead of a fabricated result.
//!
//! Collaborator failures (tokenizer, language detector) are neither: they are
//! contained inside the metadata stage and mapped to safe defaults.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the alchemark library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::output::ConversionOutput`] rather than propagated here.
#[derive(Debug, Error)]
pub enum AlchemarkError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// A page-record file could not be read or decoded.
    #[error("Invalid page records in '{path}': {detail}")]
    InvalidRecords { path: PathBuf, detail: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Selected page numbers exceed the actual page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Place libpdfium next to the alchemark executable.\n\
  • Install pdfium system-wide so the dynamic loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// There were no page records to transform.
    #[error("Document has no pages to format")]
    EmptyDocument,

    /// Every page failed; output would be empty.
    #[error("All {total} pages failed.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    /// Some pages succeeded but at least one failed.
    ///
    /// Returned by [`crate::output::ConversionOutput::into_result`] when
    /// the caller wants to treat any page failure as an error.
    #[error("{failed}/{total} pages failed during conversion")]
    PartialFailure {
        success: usize,
        failed: usize,
        total: usize,
    },

    /// The default tokenizer could not be initialised.
    #[error("Tokenizer unavailable: {0}")]
    TokenizerUnavailable(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// The overall conversion continues unless ALL pages fail.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The PDF parser could not produce a record for this page.
    #[error("Page {page}: extraction failed: {detail}")]
    ExtractionFailed { page: usize, detail: String },

    /// The page record violates `1 ≤ page ≤ page_count`.
    #[error("Page {page}: invalid page record: {detail}")]
    InvalidRecord { page: usize, detail: String },

    /// The worker transforming this page panicked or was aborted.
    #[error("Page {page}: transform task failed: {detail}")]
    TaskFailed { page: usize, detail: String },
}

impl PageError {
    /// 1-based page number the error refers to.
    pub fn page(&self) -> usize {
        match self {
            PageError::ExtractionFailed { page, .. }
            | PageError::InvalidRecord { page, .. }
            | PageError::TaskFailed { page, .. } => *page,
        }
    }
}

/// Failure reported by an external collaborator (tokenizer, language detector).
///
/// Never escapes the metadata stage: it is logged and replaced by a default.
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    /// The collaborator could not be initialised.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    /// The collaborator ran but produced no answer for this input.
    #[error("no result for input of {chars} chars")]
    Undetermined { chars: usize },

    /// Any other collaborator-specific failure.
    #[error("{0}")]
    Failed(String),
}

/// Failure to resolve one image primitive. The image is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    /// The declared MIME type is not an image type.
    #[error("declared MIME type '{mime_type}' is not an image type")]
    NotAnImage { mime_type: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_display() {
        let e = AlchemarkError::PartialFailure {
            success: 9,
            failed: 1,
            total: 10,
        };
        let msg = e.to_string();
        assert!(msg.contains("1/10"), "got: {msg}");
    }

    #[test]
    fn all_pages_failed_display() {
        let e = AlchemarkError::AllPagesFailed {
            total: 3,
            first_error: "Page 1: extraction failed: bad xref".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("All 3 pages"));
        assert!(msg.contains("bad xref"));
    }

    #[test]
    fn page_error_reports_page() {
        let e = PageError::InvalidRecord {
            page: 7,
            detail: "page exceeds page_count 5".into(),
        };
        assert_eq!(e.page(), 7);
        assert!(e.to_string().starts_with("Page 7:"));
    }

    #[test]
    fn page_error_serialises() {
        let e = PageError::ExtractionFailed {
            page: 2,
            detail: "boom".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: PageError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn image_error_display() {
        let e = ImageError::NotAnImage {
            mime_type: "text/plain".into(),
        };
        assert!(e.to_string().contains("text/plain"));
    }
}
