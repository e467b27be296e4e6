//! Streaming conversion API: emit pages as they complete.
//!
//! ## Why stream?
//!
//! A long document can take a while to tokenize. A stream-based API lets
//! callers display partial results immediately, drive progress bars, or write
//! pages to disk incrementally instead of buffering the whole run.
//!
//! Unlike the eager [`crate::convert::convert`], which returns only after all
//! pages finish, these functions yield each page's result as soon as it is
//! ready. With `concurrency > 1` pages may arrive out of order (sort by
//! [`FormattedResult::page`] if order matters). Pages skipped through
//! cancellation are simply not yielded.

use crate::config::ConversionConfig;
use crate::convert::{transform_one, PageOutcome};
use crate::error::{AlchemarkError, PageError};
use crate::model::PdfResult;
use crate::output::FormattedResult;
use crate::pipeline::extract;
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::transform::PageTransformer;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page results.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<FormattedResult, PageError>> + Send>>;

/// Transform page records, streaming results as they complete.
///
/// # Errors
/// [`AlchemarkError::EmptyDocument`] when `records` is empty,
/// [`AlchemarkError::PageOutOfRange`] when `config.pages` matches no record,
/// or [`AlchemarkError::TokenizerUnavailable`] when the default tokenizer
/// cannot be loaded. Page-level failures are yielded as `Err` items.
pub fn format_stream(
    records: Vec<PdfResult>,
    config: &ConversionConfig,
) -> Result<PageStream, AlchemarkError> {
    if records.is_empty() {
        return Err(AlchemarkError::EmptyDocument);
    }
    let transformer = Arc::new(PageTransformer::from_config(config)?);
    let total_pages = records.len();
    let selected: Vec<PdfResult> = records
        .into_iter()
        .filter(|r| config.pages.includes(r.page))
        .collect();
    if selected.is_empty() {
        return Err(AlchemarkError::PageOutOfRange {
            page: config.pages.first_page(),
            total: total_pages,
        });
    }
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(selected.len());
    }
    Ok(page_stream(transformer, selected, Vec::new(), config))
}

/// Convert a local PDF, streaming pages as they are ready.
///
/// The document is opened and every selected page extracted before this
/// returns, so fatal errors (file not found, not a PDF, encrypted, …) surface
/// here rather than inside the stream. Pages pdfium could not read are
/// yielded first as [`PageError::ExtractionFailed`] items.
///
/// # Example
/// ```rust,no_run
/// use alchemark::{convert_stream, ConversionConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut stream = convert_stream("document.pdf", &ConversionConfig::default()).await?;
/// while let Some(page) = stream.next().await {
///     match page {
///         Ok(p) => println!("Page {}: {} tokens", p.page(), p.tokens()),
///         Err(e) => eprintln!("Error: {e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn convert_stream(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<PageStream, AlchemarkError> {
    let resolved = input::resolve_local(path)?;
    stream_resolved(&resolved, config).await
}

/// Streaming equivalent of [`crate::convert::convert_from_bytes`].
///
/// Extraction completes before this returns, so the temp file holding the
/// bytes is removed before the first page is yielded.
pub async fn convert_stream_from_bytes(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<PageStream, AlchemarkError> {
    let resolved = input::resolve_bytes(bytes)?;
    stream_resolved(&resolved, config).await
}

async fn stream_resolved(
    resolved: &ResolvedInput,
    config: &ConversionConfig,
) -> Result<PageStream, AlchemarkError> {
    let pdf_path = resolved.path();
    info!("Starting streaming conversion: {}", pdf_path.display());

    let transformer = Arc::new(PageTransformer::from_config(config)?);
    let extraction =
        extract::extract_pages(pdf_path, config.password.as_deref(), &config.pages).await?;
    if extraction.page_count == 0 {
        return Err(AlchemarkError::EmptyDocument);
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(extraction.pages.len());
    }

    let (records, failures): (Vec<_>, Vec<_>) =
        extraction.pages.into_iter().partition(Result::is_ok);
    let records = records.into_iter().filter_map(Result::ok).collect();
    let failures = failures.into_iter().filter_map(Result::err).collect();

    Ok(page_stream(transformer, records, failures, config))
}

fn page_stream(
    transformer: Arc<PageTransformer>,
    records: Vec<PdfResult>,
    failures: Vec<PageError>,
    config: &ConversionConfig,
) -> PageStream {
    let total = records.len() + failures.len();
    let concurrency = config.concurrency.max(1);
    let config = config.clone();

    if let Some(ref cb) = config.progress_callback {
        for e in &failures {
            cb.on_page_error(e.page(), total, &e.to_string());
        }
    }

    let pages = stream::iter(records.into_iter().map(move |record| {
        transform_one(Arc::clone(&transformer), record, total, config.clone())
    }))
    .buffer_unordered(concurrency)
    .filter_map(|outcome| async move {
        match outcome {
            PageOutcome::Done(page) => Some(Ok(page)),
            PageOutcome::Failed(e) => Some(Err(e)),
            PageOutcome::Skipped => None,
        }
    });

    Box::pin(stream::iter(failures.into_iter().map(Err)).chain(pages))
}
