//! Alpha compositing of the warped screenshot over the template.
//!
//! The blend weight comes from one of two places. Geometry alpha warps a
//! full-opacity mask of the screenshot's shape through the same homography
//! and feathers it, so the weight follows the corners exactly. Appearance
//! alpha keys the template's own screen color, which follows rounded
//! corners and notches that a quad cannot describe.

use image::{GrayImage, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::color_key::{MaskConfig, build_mask};
use crate::homography::Homography;
use crate::types::{Dimensions, PipelineError};
use crate::warp::{Interpolation, warp_full_mask};

/// Source of per-pixel blend weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AlphaStrategy {
    /// Warp the screenshot's rectangle and feather it with an odd kernel.
    Geometry {
        feather_kernel: u32,
    },
    /// Color-key the template's screen region.
    Appearance(MaskConfig),
}

/// Blend weights in `[0, 1]`, one per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaMask {
    width: u32,
    height: u32,
    weights: Vec<f32>,
}

impl AlphaMask {
    /// Normalize an 8-bit mask by 255.
    #[must_use]
    pub fn from_gray(mask: &GrayImage) -> Self {
        Self {
            width: mask.width(),
            height: mask.height(),
            weights: mask.pixels().map(|p| f32::from(p.0[0]) / 255.0).collect(),
        }
    }

    /// A mask with the same weight everywhere, clamped to `[0, 1]`.
    #[must_use]
    pub fn uniform(width: u32, height: u32, weight: f32) -> Self {
        let len = usize::try_from(u64::from(width) * u64::from(height)).unwrap_or(0);
        Self {
            width,
            height,
            weights: vec![weight.clamp(0.0, 1.0); len],
        }
    }

    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// Weight at `(x, y)`, or `None` outside the mask.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = usize::try_from(u64::from(y) * u64::from(self.width) + u64::from(x)).ok()?;
        self.weights.get(index).copied()
    }

    /// All weights in row-major order.
    #[must_use]
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }
}

/// Derive the blend weights for one composite.
///
/// `screenshot` and `homography` describe the warp used for geometry
/// alpha; appearance alpha only looks at `template`.
///
/// # Errors
///
/// Propagates mask and warp errors ([`PipelineError::InvalidInput`]).
#[tracing::instrument(level = "debug", skip_all)]
pub fn build_alpha(
    strategy: &AlphaStrategy,
    template: &RgbImage,
    screenshot: Dimensions,
    homography: &Homography,
    interpolation: Interpolation,
) -> Result<AlphaMask, PipelineError> {
    let mask = match strategy {
        AlphaStrategy::Geometry { feather_kernel } => {
            let warped = warp_full_mask(
                screenshot.width,
                screenshot.height,
                homography,
                Dimensions::of(template),
                interpolation,
            )?;
            crate::blur::feather(&warped, *feather_kernel)
        }
        AlphaStrategy::Appearance(config) => build_mask(template, config)?,
    };
    Ok(AlphaMask::from_gray(&mask))
}

/// Blend `warped` over `background`: `warped * a + background * (1 - a)`
/// per channel, rounded and clamped to `0..=255`.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] unless all three inputs
/// share the background's dimensions.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn blend(
    warped: &RgbImage,
    alpha: &AlphaMask,
    background: &RgbImage,
) -> Result<RgbImage, PipelineError> {
    let expected = Dimensions::of(background);
    for actual in [Dimensions::of(warped), alpha.dimensions()] {
        if actual != expected {
            return Err(PipelineError::DimensionMismatch {
                stage: "blend",
                expected,
                actual,
            });
        }
    }

    let mut out = RgbImage::new(expected.width, expected.height);
    for ((dst, (src, bg)), &a) in out
        .pixels_mut()
        .zip(warped.pixels().zip(background.pixels()))
        .zip(alpha.weights())
    {
        let Rgb(s) = *src;
        let Rgb(b) = *bg;
        *dst = Rgb(std::array::from_fn(|c| {
            let v = f32::from(s[c]).mul_add(a, f32::from(b[c]) * (1.0 - a));
            v.round().clamp(0.0, 255.0) as u8
        }));
    }
    Ok(out)
}
