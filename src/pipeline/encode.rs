//! Image encoding: `DynamicImage` → base64 PNG wrapped in `ImageData`.
//!
//! VLM APIs accept images as base64 payloads in the JSON request body. PNG
//! is used because it is lossless; JPEG artefacts on rendered math strokes
//! degrade transcription accuracy, and formula crops are small enough that
//! size does not matter.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a formula crop (or full page, in page-scan mode) as a base64 PNG
/// ready for the vision API.
///
/// `detail: "high"` keeps the full image-tile budget so thin sub/superscripts
/// survive the provider's downscaling.
pub fn encode_image(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("encoded {}x{} crop, {} bytes base64", img.width(), img.height(), b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255])));
        let data = encode_image(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        // PNG magic bytes survive the round trip.
        assert_eq!(&decoded[1..4], b"PNG");
    }
}
