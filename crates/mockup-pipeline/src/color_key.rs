//! Color-key masks: isolate the keyed screen region of a template.
//!
//! Pixels are converted to an 8-bit hue/saturation/value space and kept
//! when all three channels fall inside an inclusive [`HsvRange`]. The
//! binary result can then be opened (erode + dilate) to drop noise
//! specks, dilated further to reach past a key color that stops short of
//! the physical screen edge, and feathered into a soft ramp.
//!
//! Hue uses half-degrees (0..=179) so that common key ranges such as
//! `30..=90` for green can be written exactly as the templates were
//! tuned; saturation and value use the full 0..=255 range.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::distance_transform::Norm;
use serde::{Deserialize, Serialize};

use crate::types::PipelineError;

/// Largest representable hue (half-degrees).
pub const MAX_HUE: u8 = 179;

/// An 8-bit hue/saturation/value triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hsv {
    /// Hue in half-degrees, `0..=179`.
    pub h: u8,
    /// Saturation, `0..=255`.
    pub s: u8,
    /// Value (brightness), `0..=255`.
    pub v: u8,
}

impl Hsv {
    #[must_use]
    pub const fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }
}

/// Inclusive color-key bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    /// Lower bound on every channel.
    pub lower: Hsv,
    /// Upper bound on every channel.
    pub upper: Hsv,
}

impl HsvRange {
    #[must_use]
    pub const fn new(lower: Hsv, upper: Hsv) -> Self {
        Self { lower, upper }
    }

    /// Whether `hsv` lies inside the range on all three channels.
    #[must_use]
    pub const fn contains(&self, hsv: Hsv) -> bool {
        hsv.h >= self.lower.h
            && hsv.h <= self.upper.h
            && hsv.s >= self.lower.s
            && hsv.s <= self.upper.s
            && hsv.v >= self.lower.v
            && hsv.v <= self.upper.v
    }

    fn validate(&self, field: &str) -> Result<(), PipelineError> {
        let (lo, hi) = (self.lower, self.upper);
        if lo.h > hi.h || lo.s > hi.s || lo.v > hi.v {
            return Err(PipelineError::InvalidConfig(format!(
                "{field}.key lower bound {lo:?} exceeds upper bound {hi:?}"
            )));
        }
        if hi.h > MAX_HUE {
            return Err(PipelineError::InvalidConfig(format!(
                "{field}.key hue must be at most {MAX_HUE}, got {}",
                hi.h
            )));
        }
        Ok(())
    }
}

/// Morphological cleanup applied to the raw threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Cleanup {
    /// Keep the threshold as-is.
    #[default]
    None,
    /// Open with a 3x3 square (erode then dilate) to remove specks.
    Open,
}

/// Everything needed to turn a color image into a selection mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskConfig {
    /// Which colors are selected.
    pub key: HsvRange,
    /// Noise cleanup after thresholding.
    pub cleanup: Cleanup,
    /// Number of 3x3 dilation steps applied after cleanup.
    pub dilate_iterations: u8,
    /// Gaussian feather kernel size (odd; 0 or 1 disables).
    pub feather_kernel: u32,
}

impl MaskConfig {
    pub(crate) fn validate(&self, field: &str) -> Result<(), PipelineError> {
        self.key.validate(field)?;
        crate::blur::validate_kernel(&format!("{field}.feather_kernel"), self.feather_kernel)
    }
}

/// Convert an 8-bit RGB color to 8-bit HSV.
///
/// `V = max`, `S = 255 * (max - min) / max`, and hue is the usual
/// hexcone angle halved into `0..=179`.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::many_single_char_names
)]
pub fn rgb_to_hsv(Rgb([r, g, b]): Rgb<u8>) -> Hsv {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = f32::from(max - min);

    let s = if max == 0 {
        0
    } else {
        (255.0 * diff / f32::from(max)).round() as u8
    };

    if max == min {
        return Hsv::new(0, s, max);
    }

    let (rf, gf, bf) = (f32::from(r), f32::from(g), f32::from(b));
    let mut degrees = if max == r {
        60.0 * (gf - bf) / diff
    } else if max == g {
        60.0f32.mul_add((bf - rf) / diff, 120.0)
    } else {
        60.0f32.mul_add((rf - gf) / diff, 240.0)
    };
    if degrees < 0.0 {
        degrees += 360.0;
    }
    let h = (degrees / 2.0).round() as u8;
    Hsv::new(if h > MAX_HUE { 0 } else { h }, s, max)
}

/// Select pixels inside `key`: 255 where selected, 0 elsewhere.
#[must_use]
pub fn threshold(image: &RgbImage, key: &HsvRange) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if key.contains(rgb_to_hsv(*image.get_pixel(x, y))) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Build a selection mask for the color-keyed region of `image`.
///
/// Threshold, optional open, optional dilation, then feather.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] if `image` has zero area.
#[tracing::instrument(level = "debug", skip(image), fields(width = image.width(), height = image.height()))]
pub fn build_mask(image: &RgbImage, config: &MaskConfig) -> Result<GrayImage, PipelineError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PipelineError::InvalidInput(
            "cannot build a color-key mask from an empty image".to_string(),
        ));
    }

    let mut mask = threshold(image, &config.key);

    if config.cleanup == Cleanup::Open {
        mask = imageproc::morphology::open(&mask, Norm::LInf, 1);
    }

    // An L-infinity radius of n equals n passes of a 3x3 square.
    if config.dilate_iterations > 0 {
        mask = imageproc::morphology::dilate(&mask, Norm::LInf, config.dilate_iterations);
    }

    Ok(crate::blur::feather(&mask, config.feather_kernel))
}
