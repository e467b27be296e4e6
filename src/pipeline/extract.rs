//! Page extraction: PDF file → one [`PdfResult`] per selected page, via pdfium.
//!
//! This is the parser side of the pipeline. Everything downstream works on
//! [`PdfResult`] records only, so the records produced here are the same ones a
//! caller can serialise to JSON and feed back through `--records`.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state. All calls happen inside
//! `tokio::task::spawn_blocking`, one document per blocking task, so Tokio
//! worker threads never stall on parsing.
//!
//! ## Block heuristics
//!
//! pdfium reports text objects (runs of text sharing one font) in content
//! order. Each object gets a [`BlockHint`]:
//!
//! | Condition | Hint |
//! |-----------|------|
//! | font size ≥ 1.25 × page median, short text | heading, level by ratio |
//! | starts with `•`, `-`, `*`, … | bullet list item |
//! | starts with `N.` or `N)` | numbered list item |
//! | whole text is a URL | link |
//! | otherwise | plain |
//!
//! Consecutive plain objects are merged into one paragraph. Tables are not
//! detected.

use super::encode::encode_png;
use crate::config::PageSelection;
use crate::error::{AlchemarkError, PageError};
use crate::model::{BlockHint, PdfResult, RawBlock, RawImage};
use crate::output::DocumentMetadata;
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Font-size ratio above which a short text object is a heading.
const HEADING_RATIO: f32 = 1.25;

/// Longest text (in chars) still considered a heading.
const HEADING_MAX_CHARS: usize = 120;

static NUMBERED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,4})[.)]\s+(\S.*)$").unwrap());

static BULLET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[•◦▪▫‣●○■□\-*–]\s+(\S.*)$").unwrap());

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:https?://|www\.)\S+$").unwrap());

// ── Binding ──────────────────────────────────────────────────────────────────

/// Bind to a pdfium shared library.
///
/// Tried in order: the file named by `PDFIUM_LIB_PATH`, the platform library
/// next to the running executable, then the system library search path.
pub fn bind_pdfium() -> Result<Pdfium, AlchemarkError> {
    if let Ok(path) = std::env::var("PDFIUM_LIB_PATH") {
        let path = PathBuf::from(path);
        if path.is_file() {
            debug!("Binding pdfium from PDFIUM_LIB_PATH: {}", path.display());
            return Pdfium::bind_to_library(&path)
                .map(Pdfium::new)
                .map_err(|e| AlchemarkError::PdfiumBindingFailed(format!("{:?}", e)));
        }
        warn!(
            "PDFIUM_LIB_PATH '{}' does not exist; falling back",
            path.display()
        );
    }

    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .map(|dir| Pdfium::pdfium_platform_library_name_at_path(&dir));

    let bindings = match beside_exe {
        Some(lib) if lib.is_file() => {
            debug!("Binding pdfium next to executable: {}", lib.display());
            Pdfium::bind_to_library(&lib)
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| AlchemarkError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, AlchemarkError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                AlchemarkError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                AlchemarkError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            AlchemarkError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

// ── Page extraction ──────────────────────────────────────────────────────────

/// Per-page outcome of extraction.
pub type ExtractedPage = Result<PdfResult, PageError>;

/// Extracted pages plus the document's page count.
#[derive(Debug)]
pub struct Extraction {
    pub page_count: usize,
    pub pages: Vec<ExtractedPage>,
}

/// Extract the selected pages of a PDF.
///
/// Document-level failures (binding, password, corrupt file, a selection that
/// matches no page) are fatal. A page that cannot be read becomes a
/// [`PageError::ExtractionFailed`] and the rest continue.
pub async fn extract_pages(
    pdf_path: &Path,
    password: Option<&str>,
    selection: &PageSelection,
) -> Result<Extraction, AlchemarkError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(str::to_string);
    let selection = selection.clone();

    tokio::task::spawn_blocking(move || extract_pages_blocking(&path, pwd.as_deref(), &selection))
        .await
        .map_err(|e| AlchemarkError::Internal(format!("Extraction task panicked: {}", e)))?
}

fn extract_pages_blocking(
    pdf_path: &Path,
    password: Option<&str>,
    selection: &PageSelection,
) -> Result<Extraction, AlchemarkError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;
    let pages = document.pages();
    let page_count = pages.len() as usize;
    info!("PDF loaded: {} pages", page_count);

    let indices = selection.to_indices(page_count);
    if indices.is_empty() && page_count > 0 {
        return Err(AlchemarkError::PageOutOfRange {
            page: selection.first_page(),
            total: page_count,
        });
    }
    let file_path = pdf_path.display().to_string();
    let mut out = Vec::with_capacity(indices.len());

    for idx in indices {
        let record = pages
            .get(idx as u16)
            .map_err(|e| PageError::ExtractionFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })
            .and_then(|page| read_page(&page, &file_path, idx + 1, page_count));

        match &record {
            Ok(r) => debug!(
                "Extracted page {}: {} blocks, {} images",
                idx + 1,
                r.raw_blocks.len(),
                r.raw_images.len()
            ),
            Err(e) => warn!("{}", e),
        }
        out.push(record);
    }

    Ok(Extraction {
        page_count,
        pages: out,
    })
}

fn read_page(
    page: &PdfPage,
    file_path: &str,
    page_num: usize,
    page_count: usize,
) -> Result<PdfResult, PageError> {
    let raw_text = page
        .text()
        .map_err(|e| PageError::ExtractionFailed {
            page: page_num,
            detail: format!("{:?}", e),
        })?
        .all();

    let mut fragments = Vec::new();
    for object in page.objects().iter() {
        if let Some(text) = object.as_text_object() {
            fragments.push(Fragment::Text {
                text: text.text(),
                size: text.scaled_font_size().value,
            });
        } else if let Some(image) = object.as_image_object() {
            match image.get_raw_image().map_err(|e| format!("{:?}", e)).and_then(|img| {
                let png = encode_png(&img).map_err(|e| e.to_string())?;
                Ok(RawImage::new(png)
                    .with_mime_type("image/png")
                    .with_dimensions(img.width(), img.height()))
            }) {
                Ok(raw) => fragments.push(Fragment::Image(raw)),
                Err(e) => warn!("Page {}: skipping unreadable image object: {}", page_num, e),
            }
        }
    }

    Ok(assemble_page(
        PdfResult::new(file_path, page_num, page_count).with_text(raw_text),
        fragments,
    ))
}

// ── Heuristics ───────────────────────────────────────────────────────────────

/// A page object in content order.
#[derive(Debug, Clone)]
pub enum Fragment {
    Text { text: String, size: f32 },
    Image(RawImage),
}

/// Turn content-ordered fragments into blocks and anchored images.
pub fn assemble_page(mut record: PdfResult, fragments: Vec<Fragment>) -> PdfResult {
    let mut sizes: Vec<f32> = fragments
        .iter()
        .filter_map(|f| match f {
            Fragment::Text { text, size } if !text.trim().is_empty() => Some(*size),
            _ => None,
        })
        .collect();
    let body_size = median(&mut sizes);

    for fragment in fragments {
        match fragment {
            Fragment::Image(img) => {
                let anchor = record.raw_blocks.len();
                record.raw_images.push(img.anchored_at(anchor));
            }
            Fragment::Text { text, size } => {
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                let block = classify_fragment(text, size, body_size);
                push_block(&mut record.raw_blocks, block);
            }
        }
    }
    record
}

fn push_block(blocks: &mut Vec<RawBlock>, block: RawBlock) {
    if let Some(last) = blocks.last_mut() {
        let mergeable = match (&last.hint, &block.hint) {
            (BlockHint::Plain, BlockHint::Plain) => true,
            (BlockHint::Heading { level: a }, BlockHint::Heading { level: b }) => a == b,
            _ => false,
        };
        if mergeable {
            last.text.push(' ');
            last.text.push_str(&block.text);
            return;
        }
    }
    blocks.push(block);
}

/// Hint a single text object.
pub fn classify_fragment(text: &str, size: f32, body_size: Option<f32>) -> RawBlock {
    if URL_RE.is_match(text) {
        return RawBlock::link(text, text);
    }
    if let Some(caps) = BULLET_RE.captures(text) {
        return RawBlock::bullet(&caps[1]);
    }
    if let Some(caps) = NUMBERED_RE.captures(text) {
        return RawBlock::numbered(&caps[2], caps[1].parse().ok());
    }
    if text.chars().count() <= HEADING_MAX_CHARS {
        if let Some(level) = body_size.and_then(|body| heading_level(size, body)) {
            return RawBlock::heading(text, level);
        }
    }
    RawBlock::plain(text)
}

/// Heading level for a font size relative to the body size, if it is one.
pub fn heading_level(size: f32, body_size: f32) -> Option<u8> {
    if body_size <= 0.0 {
        return None;
    }
    let ratio = size / body_size;
    match ratio {
        r if r >= 2.0 => Some(1),
        r if r >= 1.6 => Some(2),
        r if r >= 1.3 => Some(3),
        r if r >= HEADING_RATIO => Some(4),
        _ => None,
    }
}

/// Median of a set of font sizes; `None` when empty.
pub fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

// ── Document metadata ────────────────────────────────────────────────────────

/// Extract document metadata from a PDF without reading page content.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, AlchemarkError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(str::to_string);

    tokio::task::spawn_blocking(move || extract_metadata_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| AlchemarkError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn extract_metadata_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, AlchemarkError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;
    let metadata = document.metadata();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata
            .get(tag)
            .map(|t| t.value().to_string())
            .filter(|v| !v.is_empty())
    };

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    })
}
