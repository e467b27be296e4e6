//! Configuration types for page transformation runs.
//!
//! All run-level behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The config is passed explicitly down
//! the call chain; no stage reads ambient global state, so every page
//! transformation stays a pure function of its record and this struct.

use crate::analysis::{LanguageDetector, TokenCounter};
use crate::error::AlchemarkError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Configuration for a conversion run.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use alchemark::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .process_images(true)
///     .keep_images_inline(false)
///     .concurrency(8)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Process image primitives at all. Default: false.
    ///
    /// When off, `elements.images` is always empty and no image markup is
    /// emitted, whatever the parser found.
    pub process_images: bool,

    /// Embed image bytes as base64 in the Markdown instead of `[IMAGE](hash)`
    /// references. Only meaningful with `process_images`. Default: false.
    pub keep_images_inline: bool,

    /// Maximum number of pages transformed at once. Default: 4.
    ///
    /// `1` processes pages strictly one after another. Any value yields the
    /// same output; only wall-clock time changes.
    pub concurrency: usize,

    /// Minimum non-whitespace characters before language detection is
    /// attempted. Shorter text reports `"unknown"`. Default: 1.
    pub language_min_chars: usize,

    /// Page selection. Default: All pages.
    pub pages: PageSelection,

    /// Page separator in the assembled Markdown document. Default: None.
    pub page_separator: PageSeparator,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Token counter override. `None` uses the o200k_base tiktoken encoding.
    pub token_counter: Option<Arc<dyn TokenCounter>>,

    /// Language detector override. `None` uses whatlang.
    pub language_detector: Option<Arc<dyn LanguageDetector>>,

    /// Per-page progress events.
    pub progress_callback: Option<ProgressCallback>,

    /// Stops scheduling further pages once cancelled.
    pub cancellation: Option<CancellationFlag>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            process_images: false,
            keep_images_inline: false,
            concurrency: 4,
            language_min_chars: 1,
            pages: PageSelection::default(),
            page_separator: PageSeparator::default(),
            password: None,
            token_counter: None,
            language_detector: None,
            progress_callback: None,
            cancellation: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("process_images", &self.process_images)
            .field("keep_images_inline", &self.keep_images_inline)
            .field("concurrency", &self.concurrency)
            .field("language_min_chars", &self.language_min_chars)
            .field("pages", &self.pages)
            .field("page_separator", &self.page_separator)
            .field(
                "token_counter",
                &self.token_counter.as_ref().map(|_| "<dyn TokenCounter>"),
            )
            .field(
                "language_detector",
                &self.language_detector.as_ref().map(|_| "<dyn LanguageDetector>"),
            )
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .field("cancellation", &self.cancellation)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationFlag::is_cancelled)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn process_images(mut self, v: bool) -> Self {
        self.config.process_images = v;
        self
    }

    pub fn keep_images_inline(mut self, v: bool) -> Self {
        self.config.keep_images_inline = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn language_min_chars(mut self, n: usize) -> Self {
        self.config.language_min_chars = n;
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.config.token_counter = Some(counter);
        self
    }

    pub fn language_detector(mut self, detector: Arc<dyn LanguageDetector>) -> Self {
        self.config.language_detector = Some(detector);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancellation(mut self, flag: CancellationFlag) -> Self {
        self.config.cancellation = Some(flag);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, AlchemarkError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(AlchemarkError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if let PageSelection::Range(start, end) = c.pages {
            if start == 0 || start > end {
                return Err(AlchemarkError::InvalidConfig(format!(
                    "Page range must be 1-based and ascending, got {start}-{end}"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Cancellation ─────────────────────────────────────────────────────────

/// Shared flag that stops a run from scheduling further pages.
///
/// Pages already started run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Specifies which pages of the PDF to convert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Convert all pages (default).
    #[default]
    All,
    /// Convert a single page (1-indexed).
    Single(usize),
    /// Convert a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Convert specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// Lowest 1-based page the selection names (`1` for `All`).
    pub fn first_page(&self) -> usize {
        match self {
            PageSelection::All => 1,
            PageSelection::Single(p) => *p,
            PageSelection::Range(start, _) => *start,
            PageSelection::Set(pages) => pages.iter().copied().min().unwrap_or(0),
        }
    }

    /// Whether the 1-based `page` is selected.
    pub fn includes(&self, page: usize) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Single(p) => *p == page,
            PageSelection::Range(start, end) => page >= *start && page <= *end,
            PageSelection::Set(pages) => pages.contains(&page),
        }
    }
}

/// How to separate pages in the assembled Markdown output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSeparator {
    /// No separator; pages joined with "\n\n". (default)
    #[default]
    None,
    /// Horizontal rule: "\n\n---\n\n"
    HorizontalRule,
    /// HTML comment with page number: "<!-- page N -->"
    Comment,
    /// Custom string inserted between pages.
    Custom(String),
}

impl PageSeparator {
    /// Render the separator string for the given page number (1-indexed).
    pub fn render(&self, page_num: usize) -> String {
        match self {
            PageSeparator::None => "\n\n".to_string(),
            PageSeparator::HorizontalRule => "\n\n---\n\n".to_string(),
            PageSeparator::Comment => format!("\n\n<!-- page {} -->\n\n", page_num),
            PageSeparator::Custom(s) => format!("\n\n{}\n\n", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ConversionConfig::default();
        assert!(!c.process_images);
        assert!(!c.keep_images_inline);
        assert_eq!(c.concurrency, 4);
        assert_eq!(c.language_min_chars, 1);
        assert_eq!(c.pages, PageSelection::All);
    }

    #[test]
    fn builder_clamps_concurrency() {
        let c = ConversionConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn builder_rejects_inverted_range() {
        let err = ConversionConfig::builder()
            .pages(PageSelection::Range(5, 2))
            .build()
            .unwrap_err();
        assert!(matches!(err, AlchemarkError::InvalidConfig(_)));
    }

    #[test]
    fn page_selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(5), vec![0, 1, 2, 3, 4]);
        assert_eq!(PageSelection::Single(3).to_indices(5), vec![2]);
        assert_eq!(PageSelection::Single(6).to_indices(5), Vec::<usize>::new());
        assert_eq!(PageSelection::Range(2, 4).to_indices(5), vec![1, 2, 3]);
        assert_eq!(
            PageSelection::Set(vec![3, 1, 3]).to_indices(5),
            vec![0, 2] // deduplicated and sorted
        );
    }

    #[test]
    fn page_selection_includes() {
        assert!(PageSelection::Range(2, 4).includes(4));
        assert!(!PageSelection::Range(2, 4).includes(5));
        assert!(PageSelection::Set(vec![1, 7]).includes(7));
    }

    #[test]
    fn page_selection_first_page() {
        assert_eq!(PageSelection::All.first_page(), 1);
        assert_eq!(PageSelection::Range(5, 7).first_page(), 5);
        assert_eq!(PageSelection::Set(vec![12, 10]).first_page(), 10);
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let flag = CancellationFlag::new();
        let config = ConversionConfig::builder()
            .cancellation(flag.clone())
            .build()
            .unwrap();
        assert!(!config.is_cancelled());
        flag.cancel();
        assert!(config.is_cancelled());
    }

    #[test]
    fn debug_hides_trait_objects() {
        let s = format!("{:?}", ConversionConfig::default());
        assert!(s.contains("process_images"));
        assert!(s.contains("token_counter: None"));
    }
}
