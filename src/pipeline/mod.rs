//! Pipeline stages for PDF-to-Markdown conversion.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the parser side can be replaced without touching the
//! formatting side.
//!
//! ## Data Flow
//!
//! ```text
//!  input ──▶ extract ──▶ ┌──────────── transform ─────────────┐
//! (path/JSON) (pdfium)   │ classify ──▶ markdown ──▶ metadata │ ──▶ FormattedResult
//!                        │  (identity)               (tokens) │
//!                        └────────────────────────────────────┘
//! ```
//!
//! 1. [`input`]     — validate a local PDF (or buffer), or load JSON page records
//! 2. [`extract`]   — read selected pages into `PdfResult` records; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`encode`]    — PNG-encode images pdfium hands back as bitmaps
//! 4. [`postprocess`] — deterministic text cleanup applied to block text
//! 5. [`classify`]  — sort primitives into the element inventory and the
//!    ordered element stream; images go through [`identity`]
//! 6. [`markdown`]  — render the element stream to page text
//! 7. [`metadata`]  — timestamp, token count and language
//! 8. [`transform`] — composes 5–7 into one `&self` call per page

pub mod classify;
pub mod encode;
pub mod extract;
pub mod identity;
pub mod input;
pub mod markdown;
pub mod metadata;
pub mod postprocess;
pub mod transform;
