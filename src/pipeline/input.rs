//! Input resolution: validate a PDF path, or load pre-extracted page records.
//!
//! pdfium needs a file-system path, so in-memory PDFs are spilled to a
//! [`NamedTempFile`] that lives as long as the [`ResolvedInput`]. Every path
//! is checked for the `%PDF` magic bytes before pdfium sees it, so callers get
//! a meaningful error rather than an opaque parser failure.

use crate::error::AlchemarkError;
use crate::model::PdfResult;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// A PDF ready to be opened by pdfium.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a byte buffer spilled to a temp file, deleted on drop.
    Buffered(NamedTempFile),
}

impl ResolvedInput {
    /// Get the path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Buffered(tmp) => tmp.path(),
        }
    }
}

/// Validate a local PDF path: it exists, is readable and starts with `%PDF`.
pub fn resolve_local(path: impl AsRef<Path>) -> Result<ResolvedInput, AlchemarkError> {
    let path = path.as_ref().to_path_buf();

    if !path.is_file() {
        return Err(AlchemarkError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(AlchemarkError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(AlchemarkError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(AlchemarkError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Spill PDF bytes to a temp file so pdfium can open them.
pub fn resolve_bytes(bytes: &[u8]) -> Result<ResolvedInput, AlchemarkError> {
    if bytes.len() >= 4 && &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(AlchemarkError::NotAPdf {
            path: PathBuf::from("<memory>"),
            magic,
        });
    }
    let mut tmp =
        NamedTempFile::new().map_err(|e| AlchemarkError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| AlchemarkError::Internal(format!("tempfile write: {e}")))?;
    debug!("Buffered {} PDF bytes to {}", bytes.len(), tmp.path().display());
    Ok(ResolvedInput::Buffered(tmp))
}

/// Load a JSON array of page records previously produced by a parser.
pub async fn load_records(path: impl AsRef<Path>) -> Result<Vec<PdfResult>, AlchemarkError> {
    let path = path.as_ref().to_path_buf();
    let raw = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AlchemarkError::FileNotFound { path: path.clone() },
        std::io::ErrorKind::PermissionDenied => {
            AlchemarkError::PermissionDenied { path: path.clone() }
        }
        _ => AlchemarkError::InvalidRecords {
            path: path.clone(),
            detail: e.to_string(),
        },
    })?;
    let records: Vec<PdfResult> =
        serde_json::from_slice(&raw).map_err(|e| AlchemarkError::InvalidRecords {
            path: path.clone(),
            detail: e.to_string(),
        })?;
    debug!("Loaded {} page records from {}", records.len(), path.display());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let err = resolve_local("/definitely/not/here.pdf").err().unwrap();
        assert!(matches!(err, AlchemarkError::FileNotFound { .. }));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"PK\x03\x04 zip").unwrap();
        let err = resolve_local(tmp.path()).err().unwrap();
        assert!(matches!(err, AlchemarkError::NotAPdf { magic, .. } if &magic == b"PK\x03\x04"));
    }

    #[test]
    fn pdf_magic_is_accepted() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"%PDF-1.7\n").unwrap();
        assert!(resolve_local(tmp.path()).is_ok());
    }

    #[test]
    fn bytes_are_spilled_to_a_temp_file() {
        let resolved = resolve_bytes(b"%PDF-1.4\n%%EOF").unwrap();
        assert_eq!(std::fs::read(resolved.path()).unwrap(), b"%PDF-1.4\n%%EOF");
        assert!(resolve_bytes(b"GIF89a").is_err());
    }

    #[tokio::test]
    async fn records_load_from_json() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(br#"[{"file_path":"a.pdf","page":1,"page_count":1,"raw_text":"hi"}]"#)
            .unwrap();
        let records = load_records(tmp.path()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].raw_text, "hi");
    }

    #[tokio::test]
    async fn malformed_records_are_reported() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"{not json").unwrap();
        let err = load_records(tmp.path()).await.unwrap_err();
        assert!(matches!(err, AlchemarkError::InvalidRecords { .. }));
    }
}
