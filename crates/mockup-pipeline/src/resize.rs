//! Screenshot rescaling before the warp.
//!
//! Normalizing every screenshot to one width keeps the warp's
//! minification ratio (and so the apparent sharpness of the composite)
//! independent of the capture device's resolution.

use image::RgbImage;
use image::imageops::FilterType;

/// Rescale `image` to `width` pixels wide, preserving aspect ratio, with a
/// Lanczos3 filter.
///
/// Returns the (possibly unchanged) image and whether resampling was
/// actually applied. The height is rounded to the nearest pixel and never
/// drops below one.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn resize_to_width(image: &RgbImage, width: u32) -> (RgbImage, bool) {
    let (w, h) = image.dimensions();
    if w == width || w == 0 || h == 0 || width == 0 {
        return (image.clone(), false);
    }

    let height = (f64::from(h) * f64::from(width) / f64::from(w))
        .round()
        .max(1.0) as u32;
    let resized = image::imageops::resize(image, width, height, FilterType::Lanczos3);
    (resized, true)
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    fn test_image(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([128, 64, 32]))
    }

    #[test]
    fn identity_when_already_at_width() {
        let img = test_image(1200, 2600);
        let (result, applied) = resize_to_width(&img, 1200);
        assert!(!applied);
        assert_eq!(result.dimensions(), (1200, 2600));
    }

    #[test]
    fn downscale_preserves_aspect() {
        let (result, applied) = resize_to_width(&test_image(2400, 5200), 1200);
        assert!(applied);
        assert_eq!(result.dimensions(), (1200, 2600));
    }

    #[test]
    fn upscale_preserves_aspect() {
        let (result, applied) = resize_to_width(&test_image(600, 1000), 1200);
        assert!(applied);
        assert_eq!(result.dimensions(), (1200, 2000));
    }

    #[test]
    fn rounding_never_collapses_height() {
        let (result, _) = resize_to_width(&test_image(1000, 1), 10);
        assert_eq!(result.dimensions(), (10, 1));
    }

    #[test]
    fn uniform_color_survives() {
        let (result, _) = resize_to_width(&test_image(40, 20), 20);
        let p = result.get_pixel(10, 5);
        assert!(p.0[0].abs_diff(128) <= 1 && p.0[1].abs_diff(64) <= 1);
    }
}
