//! # alchemark
//!
//! Turn the per-page output of a PDF parser into structured, LLM-ready
//! Markdown records.
//!
//! ## Why this crate?
//!
//! A PDF parser hands back raw primitives: text blocks with layout hints,
//! table grids, image payloads. Retrieval and chunking pipelines want
//! something else: one clean Markdown string per page, an inventory of the
//! structural elements found on it, a token count for budgeting and the page
//! language for routing. This crate does that conversion deterministically,
//! page by page, so pages can be processed in any order or in parallel.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      validate the file (or load JSON page records)
//!  ├─ 2. Extract    pdfium → PdfResult per page (spawn_blocking)
//!  ├─ 3. Classify   blocks/tables/images → element inventory + stream
//!  ├─ 4. Render     element stream → Markdown page text
//!  ├─ 5. Metadata   tokens (tiktoken) + language (whatlang)
//!  └─ 6. Output     FormattedResult per page, sorted, plus run stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use alchemark::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder().process_images(true).build()?;
//!     let output = convert("document.pdf", &config).await?;
//!     for page in &output.pages {
//!         println!("page {}: {} tokens, {}", page.page(), page.tokens(), page.language());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Callers that already hold [`PdfResult`] records use [`format_pages`],
//! [`format_stream`] or [`PageTransformer::transform`] directly; no pdfium
//! library is needed on that path.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `alchemark` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! alchemark = { version = "0.2", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analysis;
pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analysis::{
    LanguageDetector, TiktokenCounter, TokenCounter, WhatlangDetector, WhitespaceCounter,
};
pub use config::{
    CancellationFlag, ConversionConfig, ConversionConfigBuilder, PageSelection, PageSeparator,
};
pub use convert::{
    convert, convert_from_bytes, convert_sync, convert_to_file, format_pages, inspect,
};
pub use error::{AlchemarkError, CollaboratorError, ImageError, PageError};
pub use model::{BBox, BlockHint, PdfResult, RawBlock, RawImage, RawTable};
pub use output::{
    ConversionOutput, ConversionStats, DocumentMetadata, FormattedElements, FormattedMetadata,
    FormattedResult, Image, Link, Table, UNKNOWN_LANGUAGE,
};
pub use pipeline::transform::PageTransformer;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_stream, convert_stream_from_bytes, format_stream, PageStream};
