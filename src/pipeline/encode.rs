//! Image encoding: decoded `DynamicImage` → PNG bytes.
//!
//! pdfium hands image objects back as decoded bitmaps, not their original
//! stream bytes. Re-encoding them as PNG gives every extracted image a
//! lossless, self-describing payload, so identical bitmaps always produce
//! identical bytes and therefore the same content hash.

use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a decoded image as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} image → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::identity::{content_hash, sniff_mime};
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let bytes = encode_png(&img).expect("encode should succeed");
        assert_eq!(sniff_mime(&bytes), "image/png");
    }

    #[test]
    fn identical_bitmaps_hash_identically() {
        let a = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255])));
        let b = a.clone();
        assert_eq!(
            content_hash(&encode_png(&a).unwrap()),
            content_hash(&encode_png(&b).unwrap())
        );
    }
}
