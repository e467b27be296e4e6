//! Progress-callback trait for per-page conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as pages are transformed. Pages may be processed on several worker
//! threads at once, so the trait is `Send + Sync`.
//!
//! # Example
//!
//! ```rust
//! use alchemark::{ConversionConfig, ConversionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl ConversionProgressCallback for Counter {
//!     fn on_page_complete(&self, page: usize, total: usize, text_len: usize) {
//!         let done = self.0.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("page {page}/{total}: {text_len} chars ({done} done)");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it processes each page.
///
/// All methods default to no-ops. `on_page_start`, `on_page_complete` and
/// `on_page_error` may be called concurrently when `concurrency > 1`.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before any page is scheduled, with the number of pages
    /// that will be attempted.
    fn on_conversion_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called when a page is handed to a worker.
    fn on_page_start(&self, page: usize, total_pages: usize) {
        let _ = (page, total_pages);
    }

    /// Called when a page produced a result. `text_len` is its `text_length`.
    fn on_page_complete(&self, page: usize, total_pages: usize, text_len: usize) {
        let _ = (page, total_pages, text_len);
    }

    /// Called when a page could not be produced.
    fn on_page_error(&self, page: usize, total_pages: usize, error: &str) {
        let _ = (page, total_pages, error);
    }

    /// Called once after all scheduled pages finished.
    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Tracking {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        chars: AtomicUsize,
    }

    impl ConversionProgressCallback for Tracking {
        fn on_page_start(&self, _page: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page: usize, _total: usize, text_len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            self.chars.fetch_add(text_len, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(2);
        cb.on_page_start(1, 2);
        cb.on_page_complete(1, 2, 10);
        cb.on_page_error(2, 2, "bad record");
        cb.on_conversion_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let t = Tracking::default();
        t.on_page_start(1, 2);
        t.on_page_complete(1, 2, 40);
        t.on_page_start(2, 2);
        t.on_page_error(2, 2, "extraction failed");

        assert_eq!(t.starts.load(Ordering::SeqCst), 2);
        assert_eq!(t.completes.load(Ordering::SeqCst), 1);
        assert_eq!(t.errors.load(Ordering::SeqCst), 1);
        assert_eq!(t.chars.load(Ordering::SeqCst), 40);
    }
}
