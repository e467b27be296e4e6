//! Image identity: content hashing and inline-vs-reference representation.
//!
//! Every image is identified by the MD5 of its raw bytes, so the same payload
//! gets the same hash on every run, at every position, under every
//! configuration. That hash is what the Markdown references when images are
//! not kept inline (`[IMAGE](<hash>)`), letting downstream consumers store
//! each payload once and cite it from many pages.

use crate::error::ImageError;
use crate::model::RawImage;
use crate::output::Image;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use md5::{Digest, Md5};
use std::io::Cursor;
use tracing::debug;

/// MIME type reported when neither the parser nor sniffing can tell.
pub const UNKNOWN_MIME: &str = "application/octet-stream";

/// Stable content hash of an image payload: lowercase hex MD5.
pub fn content_hash(data: &[u8]) -> String {
    format!("{:x}", Md5::digest(data))
}

/// Resolve a raw image into its output record. `number` is the image's
/// 1-based position on its page.
///
/// With `keep_inline` the payload is carried as base64; otherwise it is
/// omitted and only the hash remains. Zero-length payloads still resolve
/// (the renderer simply emits nothing for them).
///
/// # Errors
/// [`ImageError::NotAnImage`] when the parser declared a non-image MIME type.
pub fn resolve(raw: &RawImage, number: usize, keep_inline: bool) -> Result<Image, ImageError> {
    let mime_type = match raw.mime_type.as_deref().map(str::trim) {
        Some(declared) if !declared.is_empty() => {
            if !declared.to_ascii_lowercase().starts_with("image/") {
                return Err(ImageError::NotAnImage {
                    mime_type: declared.to_string(),
                });
            }
            declared.to_ascii_lowercase()
        }
        _ => sniff_mime(&raw.data).to_string(),
    };

    let (width, height) = match (raw.width, raw.height) {
        (Some(w), Some(h)) => (Some(w), Some(h)),
        (w, h) => match probe_dimensions(&raw.data) {
            Some((pw, ph)) => (w.or(Some(pw)), h.or(Some(ph))),
            None => (w, h),
        },
    };

    let hash = content_hash(&raw.data);
    debug!(
        "Resolved image {} ({}, {} bytes, inline={})",
        hash,
        mime_type,
        raw.data.len(),
        keep_inline
    );

    Ok(Image {
        number,
        hash,
        mime_type,
        base64_data: keep_inline.then(|| STANDARD.encode(&raw.data)),
        width,
        height,
        bbox: raw.bbox,
    })
}

/// Guess a MIME type from magic bytes.
///
/// Prefix checks come first so truncated payloads (a bare `\x89PNG`) are
/// still recognised; the `image` crate's detector covers the rest.
pub fn sniff_mime(data: &[u8]) -> &'static str {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\x89PNG", "image/png"),
        (b"\xFF\xD8\xFF", "image/jpeg"),
        (b"GIF8", "image/gif"),
        (b"II*\0", "image/tiff"),
        (b"MM\0*", "image/tiff"),
        (b"BM", "image/bmp"),
    ];
    if let Some((_, mime)) = SIGNATURES.iter().find(|(sig, _)| data.starts_with(sig)) {
        return *mime;
    }
    if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return "image/webp";
    }
    image::guess_format(data)
        .map(|f| f.to_mime_type())
        .unwrap_or(UNKNOWN_MIME)
}

/// Read width and height from the image header without decoding pixels.
fn probe_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.is_empty() {
        return None;
    }
    image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}
