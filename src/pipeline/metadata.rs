//! Metadata assembly: timestamp, token count and language for a rendered page.
//!
//! The tokenizer and language detector are external collaborators. Whatever
//! they do, this stage never fails: errors are logged and mapped to `0` tokens
//! and [`UNKNOWN_LANGUAGE`]. Empty pages (blank, image-only with images
//! disabled) are a normal input and skip both collaborators.

use crate::analysis::{LanguageDetector, TokenCounter};
use crate::output::UNKNOWN_LANGUAGE;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Computed per-page values that are not part of the element inventory.
#[derive(Debug, Clone, PartialEq)]
pub struct PageAnalysis {
    pub processed_timestamp: f64,
    pub tokens: usize,
    pub language: String,
}

/// Analyse the final rendered text of a page.
///
/// `page` is only used for log context. The timestamp is captured here, once
/// per page.
pub fn analyse(
    text: &str,
    page: usize,
    counter: &dyn TokenCounter,
    detector: &dyn LanguageDetector,
    language_min_chars: usize,
) -> PageAnalysis {
    let processed_timestamp = unix_now();

    if text.trim().is_empty() {
        return PageAnalysis {
            processed_timestamp,
            tokens: 0,
            language: UNKNOWN_LANGUAGE.to_string(),
        };
    }

    let tokens = counter.count_tokens(text).unwrap_or_else(|e| {
        warn!("Page {}: token counting failed, reporting 0: {}", page, e);
        0
    });

    let significant = text.chars().filter(|c| !c.is_whitespace()).count();
    let language = if significant < language_min_chars.max(1) {
        debug!(
            "Page {}: {} significant chars < {}, language unknown",
            page, significant, language_min_chars
        );
        UNKNOWN_LANGUAGE.to_string()
    } else {
        match detector.detect(text) {
            Ok(code) if !code.trim().is_empty() => code,
            Ok(_) => UNKNOWN_LANGUAGE.to_string(),
            Err(e) => {
                warn!("Page {}: language detection failed: {}", page, e);
                UNKNOWN_LANGUAGE.to_string()
            }
        }
    };

    PageAnalysis {
        processed_timestamp,
        tokens,
        language,
    }
}

/// Current Unix time in fractional seconds.
fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
