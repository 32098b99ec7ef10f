//! mockup-pipeline: Pure device-mockup compositing engine (sans-IO).
//!
//! Places a rectangular screenshot into the screen of a template
//! photograph:
//!
//! color key -> corner detection (or cached corners) -> homography ->
//! perspective warp -> alpha blend.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! images and byte slices. Files, layout persistence and batch runs live
//! in `mockup-io`.

pub mod blur;
pub mod color_key;
pub mod composite;
pub mod contour;
pub mod corners;
pub mod decode;
pub mod homography;
pub mod order;
pub mod pipeline;
pub mod resize;
pub mod safe_box;
pub mod types;
pub mod warp;

pub use color_key::{Cleanup, Hsv, HsvRange, MaskConfig};
pub use composite::{AlphaMask, AlphaStrategy};
pub use corners::{Corner, Detection, FallbackReason, RecenterStrategy, Side};
pub use homography::Homography;
pub use pipeline::Pipeline;
pub use types::{
    CornerSource, Dimensions, GrayImage, MockupConfig, MockupResult, PipelineError, Point,
    QuadCorners, RgbImage,
};
pub use warp::{BorderMode, Interpolation};

/// Locate the screen corners of a color-keyed template.
///
/// Builds the detection mask from `config.detection_mask` and fits the
/// screen outline. A degenerate fit is not an error: the result is then
/// [`Detection::Fallback`] carrying the bounding-box estimate and the
/// reason.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` is rejected,
/// [`PipelineError::InvalidInput`] if `template` is empty, and
/// [`PipelineError::NoContourFound`] if no keyed region exists.
#[tracing::instrument(level = "debug", skip_all, fields(width = template.width(), height = template.height()))]
pub fn locate_screen(
    template: &RgbImage,
    config: &MockupConfig,
) -> Result<Detection, PipelineError> {
    config.validate()?;
    pipeline::require_non_empty("template", template)?;
    let detection = pipeline::detect(template, config)?;
    if let Detection::Fallback { reason, .. } = &detection {
        tracing::debug!(%reason, "screen located by bounding box");
    }
    Ok(detection)
}

/// Render one screenshot into one template.
///
/// When `cached` is given those corners are used and detection is
/// skipped; otherwise the corners are detected and returned in the result
/// with a [`CornerSource`] that tells the caller to persist them.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for a rejected configuration,
/// [`PipelineError::InvalidInput`] for empty images,
/// [`PipelineError::NoContourFound`] when detection finds nothing to
/// replace, and [`PipelineError::DegenerateHomography`] when the corners
/// admit no perspective mapping.
pub fn render_mockup(
    screenshot: &RgbImage,
    template: &RgbImage,
    cached: Option<&QuadCorners>,
    config: &MockupConfig,
) -> Result<MockupResult, PipelineError> {
    Ok(
        Pipeline::new(screenshot.clone(), template.clone(), config.clone())
            .locate(cached)?
            .warp()?
            .composite()?
            .into_result(),
    )
}
