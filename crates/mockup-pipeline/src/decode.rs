//! In-memory image decoding and encoding.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces the
//! three-channel images the pipeline works on. Alpha channels in the input
//! are dropped; mockup templates are opaque photographs.

use std::io::Cursor;

use image::{ImageFormat, RgbImage};

use crate::types::PipelineError;

/// Decode raw image bytes to 8-bit RGB.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] if `bytes` is empty and
/// [`PipelineError::Codec`] if the format is unrecognized or the data is
/// corrupt.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::InvalidInput(
            "image data is empty".to_string(),
        ));
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

/// Encode an RGB image as PNG.
///
/// # Errors
///
/// Returns [`PipelineError::Codec`] if encoding fails.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, PipelineError> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgb;

    use super::*;

    #[test]
    fn empty_input_returns_error() {
        assert!(matches!(
            decode_rgb(&[]),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[test]
    fn corrupt_bytes_return_codec_error() {
        assert!(matches!(
            decode_rgb(&[0xFF, 0xFE, 0x00, 0x01]),
            Err(PipelineError::Codec(_))
        ));
    }

    #[test]
    fn png_survives_encode_and_decode() {
        let img = RgbImage::from_fn(3, 2, |x, y| Rgb([(x * 80) as u8, (y * 120) as u8, 7]));
        let bytes = encode_png(&img).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
        assert_eq!(decode_rgb(&bytes).unwrap(), img);
    }

    #[test]
    fn rgba_input_drops_alpha() {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 0]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        let decoded = decode_rgb(buf.get_ref()).unwrap();
        assert_eq!(decoded.get_pixel(1, 1), &Rgb([10, 20, 30]));
    }
}
