//! Text cleanup: deterministic normalisation of block text.
//!
//! The parser's text layer carries artefacts that would otherwise leak into
//! the Markdown: Windows line endings, zero-width characters from ligature
//! handling, trailing spaces, runs of empty lines. Cleanup runs on each block
//! *before* classification so that the element inventories and the rendered
//! page text see exactly the same strings.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so the per-line rules see `\n` only;
//! invisible characters go before trimming so a line holding just a BOM ends
//! up empty and collapses with its neighbours.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a block of text.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF/CR → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 2+ consecutive blank lines down to 1
/// 5. Trim leading/trailing whitespace of the whole block
pub fn clean_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

/// Clean a block and fold it onto one line (headings, list items, link text).
pub fn single_line(input: &str) -> String {
    RE_WHITESPACE_RUN
        .replace_all(&clean_text(input), " ")
        .into_owned()
}

/// Split unstructured text into paragraphs at blank lines.
pub fn split_paragraphs(input: &str) -> Vec<String> {
    clean_text(input)
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

static RE_WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(
            trim_trailing_whitespace("  hello   \nworld  "),
            "  hello\nworld"
        );
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn test_clean_text_full_pipeline() {
        let input = "\u{FEFF}\r\n  First line   \r\n\r\n\r\n\r\nSecond\u{200B} line \r\n";
        assert_eq!(clean_text(input), "First line\n\nSecond line");
    }

    #[test]
    fn test_whitespace_only_block_becomes_empty() {
        assert_eq!(clean_text(" \n\t\n\u{200B} "), "");
    }

    #[test]
    fn test_single_line() {
        assert_eq!(single_line("Chapter\n  One\t Intro "), "Chapter One Intro");
    }

    #[test]
    fn test_split_paragraphs() {
        let paras = split_paragraphs("Alpha line\nstill alpha\n\n\n\nBeta\n\n  \n");
        assert_eq!(paras, vec!["Alpha line\nstill alpha", "Beta"]);
    }
}
