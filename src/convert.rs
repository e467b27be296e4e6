//! Eager (whole-run) conversion entry points.
//!
//! ## Why eager vs. streaming?
//!
//! This module provides the simpler API: wait for all pages, then return.
//! It collects every [`FormattedResult`] into memory, sorted by page. Use
//! [`crate::stream`] instead when you want pages as soon as they finish.
//!
//! ## Concurrency
//!
//! Pages are independent, so they are transformed through
//! `buffer_unordered(config.concurrency)`, each on a `spawn_blocking` thread
//! (tokenization is CPU-bound). The output is sorted afterwards, which makes
//! it identical for every concurrency level.

use crate::config::ConversionConfig;
use crate::error::{AlchemarkError, PageError};
use crate::model::PdfResult;
use crate::output::{ConversionOutput, ConversionStats, DocumentMetadata, FormattedResult};
use crate::pipeline::extract;
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::transform::PageTransformer;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a local PDF file into per-page formatted results.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ConversionOutput)` on success, even if some pages failed
/// (check `output.failures`).
///
/// # Errors
/// Returns `Err(AlchemarkError)` only for fatal errors:
/// - File not found / permission denied / not a PDF
/// - pdfium unavailable, corrupt or encrypted PDF
/// - Every page failed
pub async fn convert(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, AlchemarkError> {
    let resolved = input::resolve_local(path)?;
    convert_resolved(&resolved, config).await
}

/// Convert PDF bytes held in memory.
///
/// pdfium needs a path, so the bytes are written to a managed temp file that
/// is removed when this function returns.
///
/// # Example
/// ```rust,no_run
/// use alchemark::{convert_from_bytes, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("document.pdf")?;
/// let output = convert_from_bytes(&bytes, &ConversionConfig::default()).await?;
/// println!("{} pages", output.pages.len());
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<ConversionOutput, AlchemarkError> {
    let resolved = input::resolve_bytes(bytes)?;
    convert_resolved(&resolved, config).await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, AlchemarkError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| AlchemarkError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(path, config))
}

/// Convert a PDF and write the page results as a JSON array.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, AlchemarkError> {
    let output = convert(path, config).await?;
    write_json(output_path.as_ref(), &output.pages).await?;
    Ok(output.stats)
}

/// Extract PDF metadata without converting content.
pub async fn inspect(
    path: impl AsRef<Path>,
    password: Option<&str>,
) -> Result<DocumentMetadata, AlchemarkError> {
    let resolved = input::resolve_local(path)?;
    extract::extract_metadata(resolved.path(), password).await
}

/// Transform page records that were already extracted.
///
/// `config.pages` filters the records by their page number. An empty input is
/// [`AlchemarkError::EmptyDocument`].
pub async fn format_pages(
    records: Vec<PdfResult>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, AlchemarkError> {
    let total_start = Instant::now();
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
    info!("Formatting {} of {} page records", selected.len(), total_pages);

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(selected.len());
    }
    let total = selected.len();
    let run = transform_pages(transformer, selected, total, config).await;

    finish(run, Vec::new(), total_pages, 0, total_start, config)
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn convert_resolved(
    resolved: &ResolvedInput,
    config: &ConversionConfig,
) -> Result<ConversionOutput, AlchemarkError> {
    let total_start = Instant::now();
    let pdf_path = resolved.path();
    info!("Starting conversion: {}", pdf_path.display());

    // ── Step 1: Collaborators ────────────────────────────────────────────
    let transformer = Arc::new(PageTransformer::from_config(config)?);

    // ── Step 2: Extract records ──────────────────────────────────────────
    let extract_start = Instant::now();
    let extraction =
        extract::extract_pages(pdf_path, config.password.as_deref(), &config.pages).await?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    info!(
        "Extracted {} pages in {}ms",
        extraction.pages.len(),
        extract_duration_ms
    );

    if extraction.page_count == 0 {
        return Err(AlchemarkError::EmptyDocument);
    }

    let selected = extraction.pages.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(selected);
    }

    let mut records = Vec::with_capacity(selected);
    let mut extract_failures = Vec::new();
    for page in extraction.pages {
        match page {
            Ok(record) => records.push(record),
            Err(e) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_error(e.page(), selected, &e.to_string());
                }
                extract_failures.push(e);
            }
        }
    }

    // ── Step 3: Transform pages ──────────────────────────────────────────
    let run = transform_pages(transformer, records, selected, config).await;

    finish(
        run,
        extract_failures,
        extraction.page_count,
        extract_duration_ms,
        total_start,
        config,
    )
}

/// Outcome of transforming one page.
pub(crate) enum PageOutcome {
    Done(FormattedResult),
    Failed(PageError),
    Skipped,
}

/// Pages produced by one transform pass, unsorted.
struct PageRun {
    pages: Vec<FormattedResult>,
    failures: Vec<PageError>,
    skipped: usize,
    duration_ms: u64,
}

/// Transform one record on a blocking thread, firing progress events.
///
/// Cancellation is checked here, when the page is scheduled; a page that has
/// started always completes.
pub(crate) async fn transform_one(
    transformer: Arc<PageTransformer>,
    record: PdfResult,
    total: usize,
    config: ConversionConfig,
) -> PageOutcome {
    let page_num = record.page;
    if config.is_cancelled() {
        debug!("Page {}: skipped, run cancelled", page_num);
        return PageOutcome::Skipped;
    }
    if let Some(ref cb) = config.progress_callback {
        cb.on_page_start(page_num, total);
    }

    let result = tokio::task::spawn_blocking(move || transformer.transform(&record))
        .await
        .unwrap_or_else(|e| {
            Err(PageError::TaskFailed {
                page: page_num,
                detail: e.to_string(),
            })
        });

    match result {
        Ok(page) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_complete(page_num, total, page.metadata().text_length);
            }
            PageOutcome::Done(page)
        }
        Err(e) => {
            warn!("{}", e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_error(page_num, total, &e.to_string());
            }
            PageOutcome::Failed(e)
        }
    }
}

/// `total` is the page count reported to progress callbacks.
async fn transform_pages(
    transformer: Arc<PageTransformer>,
    records: Vec<PdfResult>,
    total: usize,
    config: &ConversionConfig,
) -> PageRun {
    let start = Instant::now();

    let outcomes: Vec<PageOutcome> = stream::iter(records.into_iter().map(|record| {
        transform_one(Arc::clone(&transformer), record, total, config.clone())
    }))
    .buffer_unordered(config.concurrency.max(1))
    .collect()
    .await;

    let mut run = PageRun {
        pages: Vec::with_capacity(outcomes.len()),
        failures: Vec::new(),
        skipped: 0,
        duration_ms: 0,
    };
    for outcome in outcomes {
        match outcome {
            PageOutcome::Done(p) => run.pages.push(p),
            PageOutcome::Failed(e) => run.failures.push(e),
            PageOutcome::Skipped => run.skipped += 1,
        }
    }
    run.duration_ms = start.elapsed().as_millis() as u64;
    run
}

fn finish(
    mut run: PageRun,
    extract_failures: Vec<PageError>,
    total_pages: usize,
    extract_duration_ms: u64,
    total_start: Instant,
    config: &ConversionConfig,
) -> Result<ConversionOutput, AlchemarkError> {
    run.failures.extend(extract_failures);
    run.pages.sort_by_key(FormattedResult::page);
    run.failures.sort_by_key(PageError::page);

    let processed = run.pages.len();
    let failed = run.failures.len();
    let attempted = processed + failed + run.skipped;

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(attempted, processed);
    }

    if processed == 0 && failed > 0 {
        return Err(AlchemarkError::AllPagesFailed {
            total: failed,
            first_error: run.failures[0].to_string(),
        });
    }

    let stats = ConversionStats {
        total_pages,
        processed_pages: processed,
        failed_pages: failed,
        skipped_pages: run.skipped,
        total_tokens: run.pages.iter().map(|p| p.tokens() as u64).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        extract_duration_ms,
        transform_duration_ms: run.duration_ms,
    };

    info!(
        "Conversion complete: {}/{} pages, {} tokens, {}ms total",
        processed, attempted, stats.total_tokens, stats.total_duration_ms
    );

    Ok(ConversionOutput {
        pages: run.pages,
        failures: run.failures,
        stats,
    })
}

/// Write `value` as pretty JSON to `path` via a temp file and rename.
pub(crate) async fn write_json<T: serde::Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), AlchemarkError> {
    let write_err = |e: std::io::Error| AlchemarkError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let body = serde_json::to_vec_pretty(value)
        .map_err(|e| AlchemarkError::Internal(format!("JSON serialisation failed: {}", e)))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &body).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    debug!("Wrote {} bytes to {}", body.len(), path.display());
    Ok(())
}
