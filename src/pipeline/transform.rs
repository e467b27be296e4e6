//! Page transformation: one [`PdfResult`] in, one [`FormattedResult`] out.
//!
//! [`PageTransformer`] composes the stages in a fixed order:
//!
//! ```text
//! classify (+ image identity) ──▶ markdown ──▶ metadata ──▶ FormattedResult
//! ```
//!
//! A transformer holds only immutable run-level state (flags and shared
//! collaborators), takes `&self`, and is `Send + Sync`. Pages are therefore
//! independent units: transforming them one after another or on many threads
//! at once gives identical results.

use super::classify::{classify_page, ClassifyOptions};
use super::markdown::{render_page, RenderOptions};
use super::metadata::analyse;
use crate::analysis::{LanguageDetector, TiktokenCounter, TokenCounter, WhatlangDetector};
use crate::config::ConversionConfig;
use crate::error::{AlchemarkError, PageError};
use crate::model::PdfResult;
use crate::output::FormattedResult;
use std::sync::Arc;
use tracing::debug;

/// Transforms page records into formatted results.
#[derive(Clone)]
pub struct PageTransformer {
    process_images: bool,
    keep_images_inline: bool,
    language_min_chars: usize,
    counter: Arc<dyn TokenCounter>,
    detector: Arc<dyn LanguageDetector>,
}

impl std::fmt::Debug for PageTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageTransformer")
            .field("process_images", &self.process_images)
            .field("keep_images_inline", &self.keep_images_inline)
            .field("language_min_chars", &self.language_min_chars)
            .finish_non_exhaustive()
    }
}

impl PageTransformer {
    /// Build a transformer from explicit parts.
    pub fn new(
        process_images: bool,
        keep_images_inline: bool,
        counter: Arc<dyn TokenCounter>,
        detector: Arc<dyn LanguageDetector>,
    ) -> Self {
        Self {
            process_images,
            keep_images_inline,
            language_min_chars: 1,
            counter,
            detector,
        }
    }

    pub fn with_language_min_chars(mut self, n: usize) -> Self {
        self.language_min_chars = n;
        self
    }

    /// Build a transformer from a run configuration, instantiating the
    /// default collaborators where the config supplies none.
    ///
    /// # Errors
    /// [`AlchemarkError::TokenizerUnavailable`] if the default tokenizer
    /// cannot be loaded.
    pub fn from_config(config: &ConversionConfig) -> Result<Self, AlchemarkError> {
        let counter: Arc<dyn TokenCounter> = match &config.token_counter {
            Some(c) => Arc::clone(c),
            None => Arc::new(
                TiktokenCounter::o200k()
                    .map_err(|e| AlchemarkError::TokenizerUnavailable(e.to_string()))?,
            ),
        };
        let detector: Arc<dyn LanguageDetector> = match &config.language_detector {
            Some(d) => Arc::clone(d),
            None => Arc::new(WhatlangDetector),
        };
        Ok(Self::new(
            config.process_images,
            config.keep_images_inline,
            counter,
            detector,
        )
        .with_language_min_chars(config.language_min_chars))
    }

    /// Transform one page.
    ///
    /// # Errors
    /// [`PageError::InvalidRecord`] when the record breaks
    /// `1 ≤ page ≤ page_count`. Nothing else on a page can fail.
    pub fn transform(&self, page: &PdfResult) -> Result<FormattedResult, PageError> {
        page.validate().map_err(|detail| PageError::InvalidRecord {
            page: page.page,
            detail,
        })?;

        let classified = classify_page(
            page,
            &ClassifyOptions {
                process_images: self.process_images,
                keep_images_inline: self.keep_images_inline,
            },
        );
        let text = render_page(
            &classified.items,
            &RenderOptions {
                keep_images_inline: self.keep_images_inline,
            },
        );
        let analysis = analyse(
            &text,
            page.page,
            self.counter.as_ref(),
            self.detector.as_ref(),
            self.language_min_chars,
        );
        debug!(
            "Page {}/{}: {} chars, {} tokens, language {}",
            page.page,
            page.page_count,
            text.chars().count(),
            analysis.tokens,
            analysis.language
        );

        Ok(FormattedResult::new(
            page,
            analysis.processed_timestamp,
            classified.elements,
            text,
            analysis.tokens,
            analysis.language,
        ))
    }

    /// Transform pages one after another, in input order.
    ///
    /// Returns the successes in increasing page order and the per-page
    /// failures; an empty input is an error.
    pub fn transform_all(
        &self,
        pages: &[PdfResult],
    ) -> Result<(Vec<FormattedResult>, Vec<PageError>), AlchemarkError> {
        if pages.is_empty() {
            return Err(AlchemarkError::EmptyDocument);
        }
        let mut results = Vec::with_capacity(pages.len());
        let mut failures = Vec::new();
        for page in pages {
            match self.transform(page) {
                Ok(r) => results.push(r),
                Err(e) => failures.push(e),
            }
        }
        results.sort_by_key(FormattedResult::page);
        failures.sort_by_key(PageError::page);
        Ok((results, failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::WhitespaceCounter;
    use crate::model::{RawBlock, RawImage};

    fn transformer(process_images: bool, inline: bool) -> PageTransformer {
        PageTransformer::new(
            process_images,
            inline,
            Arc::new(WhitespaceCounter),
            Arc::new(WhatlangDetector),
        )
    }

    #[test]
    fn transformer_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PageTransformer>();
    }

    #[test]
    fn invalid_record_is_a_page_error() {
        let err = transformer(false, false)
            .transform(&PdfResult::new("d.pdf", 3, 2))
            .unwrap_err();
        assert!(matches!(err, PageError::InvalidRecord { page: 3, .. }));
    }

    #[test]
    fn text_length_matches_text() {
        let page = PdfResult::new("d.pdf", 1, 1)
            .with_block(RawBlock::heading("Résumé", 1))
            .with_block(RawBlock::plain("Ünïcödé body"));
        let r = transformer(false, false).transform(&page).unwrap();
        assert_eq!(r.metadata().text_length, r.text().chars().count());
        assert_eq!(r.text(), "# Résumé\n\nÜnïcödé body");
        assert_eq!(r.tokens(), 4);
    }

    #[test]
    fn reference_policy_end_to_end() {
        let page = PdfResult::new("d.pdf", 1, 1).with_image(RawImage::new(b"\x89PNG".to_vec()));
        let r = transformer(true, false).transform(&page).unwrap();
        let img = &r.elements().images[0];
        assert!(img.base64_data.is_none());
        assert_eq!(r.text().matches(&format!("[IMAGE]({})", img.hash)).count(), 1);
    }

    #[test]
    fn transform_all_rejects_empty_input() {
        assert!(matches!(
            transformer(false, false).transform_all(&[]),
            Err(AlchemarkError::EmptyDocument)
        ));
    }

    #[test]
    fn transform_all_sorts_and_collects_failures() {
        let pages = vec![
            PdfResult::new("d.pdf", 2, 2).with_text("two"),
            PdfResult::new("d.pdf", 0, 2),
            PdfResult::new("d.pdf", 1, 2).with_text("one"),
        ];
        let (ok, failed) = transformer(false, false).transform_all(&pages).unwrap();
        assert_eq!(ok.iter().map(|r| r.page()).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(failed.len(), 1);
    }
}
