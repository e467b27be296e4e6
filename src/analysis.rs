//! External collaborators used by the metadata stage.
//!
//! The pipeline treats token counting and language identification as opaque
//! services behind two small traits. The defaults wrap `tiktoken-rs`
//! (o200k_base, the GPT-4o encoding) and `whatlang`; tests and callers with
//! their own models plug in other implementations through
//! [`crate::config::ConversionConfigBuilder`].
//!
//! Implementations must be deterministic for identical input and must report
//! failure through [`CollaboratorError`] rather than panicking. The caller maps
//! every error to a safe default.

use crate::error::CollaboratorError;
use std::sync::Arc;
use tiktoken_rs::CoreBPE;

/// Counts model tokens in a piece of text.
pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, text: &str) -> Result<usize, CollaboratorError>;
}

/// Identifies the language of a piece of text.
pub trait LanguageDetector: Send + Sync {
    /// Returns a language code such as `"en"`.
    fn detect(&self, text: &str) -> Result<String, CollaboratorError>;
}

/// BPE token counter backed by `tiktoken-rs`.
#[derive(Clone)]
pub struct TiktokenCounter {
    bpe: Arc<CoreBPE>,
}

impl TiktokenCounter {
    /// The o200k_base encoding used by GPT-4o.
    pub fn o200k() -> Result<Self, CollaboratorError> {
        let bpe = tiktoken_rs::o200k_base()
            .map_err(|e| CollaboratorError::Unavailable(format!("o200k_base: {e}")))?;
        Ok(Self { bpe: Arc::new(bpe) })
    }

    /// The cl100k_base encoding used by GPT-4 and GPT-3.5.
    pub fn cl100k() -> Result<Self, CollaboratorError> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| CollaboratorError::Unavailable(format!("cl100k_base: {e}")))?;
        Ok(Self { bpe: Arc::new(bpe) })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count_tokens(&self, text: &str) -> Result<usize, CollaboratorError> {
        Ok(self.bpe.encode_with_special_tokens(text).len())
    }
}

/// Counts whitespace-separated words. Cheap and dependency-free; useful for
/// tests and offline estimates.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceCounter;

impl TokenCounter for WhitespaceCounter {
    fn count_tokens(&self, text: &str) -> Result<usize, CollaboratorError> {
        Ok(text.split_whitespace().count())
    }
}

/// Trigram-based language detector backed by `whatlang`.
///
/// Returns two-letter ISO 639-1 codes (`"en"`, `"de"`, `"fr"`, …), spelled
/// the way `langdetect` spells them, so Chinese is `"zh-cn"` and Norwegian
/// Bokmål is `"no"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatlangDetector;

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Result<String, CollaboratorError> {
        let info = whatlang::detect(text).ok_or(CollaboratorError::Undetermined {
            chars: text.chars().count(),
        })?;
        let code = info.lang().code();
        iso_639_1(code)
            .map(str::to_string)
            .ok_or_else(|| CollaboratorError::Failed(format!("no ISO 639-1 code for '{code}'")))
    }
}

/// ISO 639-3 (as reported by `whatlang`) → ISO 639-1.
fn iso_639_1(code: &str) -> Option<&'static str> {
    let two = match code {
        "afr" => "af",
        "aka" => "ak",
        "amh" => "am",
        "ara" => "ar",
        "aze" => "az",
        "bel" => "be",
        "ben" => "bn",
        "bul" => "bg",
        "cat" => "ca",
        "ces" => "cs",
        "cmn" => "zh-cn",
        "dan" => "da",
        "deu" => "de",
        "ell" => "el",
        "eng" => "en",
        "epo" => "eo",
        "est" => "et",
        "fin" => "fi",
        "fra" => "fr",
        "guj" => "gu",
        "heb" => "he",
        "hin" => "hi",
        "hrv" => "hr",
        "hun" => "hu",
        "hye" => "hy",
        "ind" => "id",
        "ita" => "it",
        "jav" => "jv",
        "jpn" => "ja",
        "kan" => "kn",
        "kat" => "ka",
        "khm" => "km",
        "kor" => "ko",
        "lat" => "la",
        "lav" => "lv",
        "lit" => "lt",
        "mal" => "ml",
        "mar" => "mr",
        "mkd" => "mk",
        "mya" => "my",
        "nep" => "ne",
        "nld" => "nl",
        "nob" => "no",
        "ori" => "or",
        "pan" => "pa",
        "pes" => "fa",
        "pol" => "pl",
        "por" => "pt",
        "ron" => "ro",
        "rus" => "ru",
        "sin" => "si",
        "slk" => "sk",
        "slv" => "sl",
        "sna" => "sn",
        "spa" => "es",
        "srp" => "sr",
        "swe" => "sv",
        "tam" => "ta",
        "tel" => "te",
        "tgl" => "tl",
        "tha" => "th",
        "tuk" => "tk",
        "tur" => "tr",
        "ukr" => "uk",
        "urd" => "ur",
        "uzb" => "uz",
        "vie" => "vi",
        "yid" => "yi",
        "zul" => "zu",
        _ => return None,
    };
    Some(two)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_counter_counts_words() {
        let c = WhitespaceCounter;
        assert_eq!(c.count_tokens("one two\n three").unwrap(), 3);
        assert_eq!(c.count_tokens("").unwrap(), 0);
    }

    #[test]
    fn tiktoken_counter_is_deterministic() {
        let c = TiktokenCounter::o200k().unwrap();
        let text = "# Title\n\nSome body text for counting.";
        let first = c.count_tokens(text).unwrap();
        assert!(first > 0);
        assert_eq!(first, c.count_tokens(text).unwrap());
    }

    #[test]
    fn whatlang_detects_english() {
        let d = WhatlangDetector;
        let code = d
            .detect("The quick brown fox jumps over the lazy dog while the farmer watches from the field.")
            .unwrap();
        assert_eq!(code, "en");
    }

    #[test]
    fn whatlang_codes_map_to_two_letters() {
        assert_eq!(iso_639_1("deu"), Some("de"));
        assert_eq!(iso_639_1("cmn"), Some("zh-cn"));
        assert_eq!(iso_639_1("nob"), Some("no"));
        assert_eq!(iso_639_1("xxx"), None);
    }

    #[test]
    fn whatlang_detects_french() {
        let code = WhatlangDetector
            .detect("Le petit chat dort tranquillement sur le canapé pendant que la pluie tombe dehors.")
            .unwrap();
        assert_eq!(code, "fr");
    }

    #[test]
    fn whatlang_fails_on_symbols() {
        let d = WhatlangDetector;
        assert!(d.detect("12345 ---").is_err());
    }
}
