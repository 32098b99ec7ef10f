//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! [`crate::render_mockup`] runs every stage in one call. [`Pipeline`]
//! lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use mockup_pipeline::{MockupConfig, Pipeline, PipelineError, RgbImage};
//! # fn run(screenshot: RgbImage, template: RgbImage) -> Result<(), PipelineError> {
//! let located = Pipeline::new(screenshot, template, MockupConfig::default()).locate(None)?;
//! println!("screen at {:?} ({:?})", located.corners(), located.source());
//!
//! let result = located.warp()?.composite()?.into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! carrying the inputs and every intermediate computed so far.

use crate::composite::{AlphaMask, blend, build_alpha};
use crate::corners::Detection;
use crate::homography::Homography;
use crate::types::{
    CornerSource, Dimensions, MockupConfig, MockupResult, PipelineError, QuadCorners, RgbImage,
};
use crate::warp::warp_perspective;

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`locate`](Self::locate) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .locate() to continue"]
pub struct Pending {
    config: MockupConfig,
    screenshot: RgbImage,
    template: RgbImage,
}

impl Pending {
    #[must_use]
    pub const fn screenshot(&self) -> &RgbImage {
        &self.screenshot
    }

    #[must_use]
    pub const fn template(&self) -> &RgbImage {
        &self.template
    }

    #[must_use]
    pub const fn config(&self) -> &MockupConfig {
        &self.config
    }

    /// Find the screen corners and advance to the [`Located`] stage.
    ///
    /// `cached` corners are used as-is and skip detection entirely.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for a rejected
    /// configuration, [`PipelineError::InvalidInput`] for an empty
    /// screenshot or template and [`PipelineError::NoContourFound`] when
    /// detection finds no keyed region.
    pub fn locate(self, cached: Option<&QuadCorners>) -> Result<Located, PipelineError> {
        self.config.validate()?;
        require_non_empty("screenshot", &self.screenshot)?;
        require_non_empty("template", &self.template)?;

        let (corners, source) = match cached {
            Some(corners) => (*corners, CornerSource::Cached),
            None => match detect(&self.template, &self.config)? {
                Detection::Detected(corners) => (corners, CornerSource::Detected),
                Detection::Fallback { corners, reason } => {
                    (corners, CornerSource::Fallback(reason))
                }
            },
        };

        Ok(Located {
            config: self.config,
            screenshot: self.screenshot,
            template: self.template,
            corners,
            source,
        })
    }
}

// ───────────────────────── Stage 1: Located ──────────────────────────

/// Pipeline state once the destination corners are known.
///
/// Call [`warp`](Self::warp) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .warp() to continue"]
pub struct Located {
    config: MockupConfig,
    screenshot: RgbImage,
    template: RgbImage,
    corners: QuadCorners,
    source: CornerSource,
}

impl Located {
    /// The destination corners in template coordinates.
    #[must_use]
    pub const fn corners(&self) -> QuadCorners {
        self.corners
    }

    /// Where the corners came from.
    #[must_use]
    pub const fn source(&self) -> CornerSource {
        self.source
    }

    #[must_use]
    pub const fn template(&self) -> &RgbImage {
        &self.template
    }

    /// Rescale the screenshot if configured, solve the homography and
    /// warp the screenshot onto a template-sized canvas.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DegenerateHomography`] if the corners
    /// admit no perspective mapping.
    #[tracing::instrument(level = "debug", skip_all, fields(corners = ?self.corners))]
    pub fn warp(self) -> Result<Warped, PipelineError> {
        let (screenshot, rescaled) = match self.config.screenshot_width {
            Some(width) => {
                let (resized, changed) = crate::resize::resize_to_width(&self.screenshot, width);
                if changed {
                    tracing::debug!(
                        from = ?self.screenshot.dimensions(),
                        to = ?resized.dimensions(),
                        "rescaled screenshot"
                    );
                }
                (resized, changed)
            }
            None => (self.screenshot, false),
        };
        let (w, h) = screenshot.dimensions();
        let homography = Homography::rect_to_quad(w, h, &self.corners)?;
        let warped = warp_perspective(
            &screenshot,
            &homography,
            Dimensions::of(&self.template),
            self.config.interpolation,
            self.config.border,
        )?;

        Ok(Warped {
            config: self.config,
            screenshot,
            template: self.template,
            corners: self.corners,
            source: self.source,
            homography,
            rescaled,
            warped,
        })
    }
}

// ───────────────────────── Stage 2: Warped ───────────────────────────

/// Pipeline state after the perspective warp.
///
/// Call [`composite`](Self::composite) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .composite() to continue"]
pub struct Warped {
    config: MockupConfig,
    screenshot: RgbImage,
    template: RgbImage,
    corners: QuadCorners,
    source: CornerSource,
    homography: Homography,
    rescaled: bool,
    warped: RgbImage,
}

impl Warped {
    /// The homography from screenshot to template coordinates.
    #[must_use]
    pub const fn homography(&self) -> &Homography {
        &self.homography
    }

    /// Whether the screenshot was resampled to the configured width.
    #[must_use]
    pub const fn rescaled(&self) -> bool {
        self.rescaled
    }

    /// The screenshot as warped, after any rescaling.
    #[must_use]
    pub const fn screenshot(&self) -> &RgbImage {
        &self.screenshot
    }

    /// The warped screenshot on a template-sized canvas.
    #[must_use]
    pub const fn warped(&self) -> &RgbImage {
        &self.warped
    }

    /// Derive the blend weights and merge the warped screenshot into the
    /// template.
    ///
    /// # Errors
    ///
    /// Propagates errors from alpha construction and blending.
    pub fn composite(self) -> Result<Composited, PipelineError> {
        let alpha = build_alpha(
            &self.config.alpha,
            &self.template,
            Dimensions::of(&self.screenshot),
            &self.homography,
            self.config.interpolation,
        )?;
        let composite = blend(&self.warped, &alpha, &self.template)?;
        Ok(Composited {
            corners: self.corners,
            source: self.source,
            dimensions: Dimensions::of(&self.template),
            alpha,
            composite,
        })
    }
}

// ───────────────────────── Stage 3: Composited ───────────────────────

/// Final pipeline state.
#[must_use = "call .into_result() to take the composite"]
pub struct Composited {
    corners: QuadCorners,
    source: CornerSource,
    dimensions: Dimensions,
    alpha: AlphaMask,
    composite: RgbImage,
}

impl Composited {
    /// The blend weights that were applied.
    #[must_use]
    pub const fn alpha(&self) -> &AlphaMask {
        &self.alpha
    }

    #[must_use]
    pub const fn composite(&self) -> &RgbImage {
        &self.composite
    }

    /// Consume the pipeline and return the [`MockupResult`].
    #[must_use]
    pub fn into_result(self) -> MockupResult {
        MockupResult {
            composite: self.composite,
            corners: self.corners,
            source: self.source,
            dimensions: self.dimensions,
        }
    }
}

/// Entry point for the staged pipeline.
///
/// Each stage method consumes the current state and returns the next,
/// making it a compile-time error to skip stages or call them out of
/// order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline. No processing is performed until
    /// [`.locate()`](Pending::locate) is called.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(screenshot: RgbImage, template: RgbImage, config: MockupConfig) -> Pending {
        Pending {
            config,
            screenshot,
            template,
        }
    }
}

/// Key the template and detect its screen corners. Assumes a validated
/// config.
pub(crate) fn detect(
    template: &RgbImage,
    config: &MockupConfig,
) -> Result<Detection, PipelineError> {
    let mask = crate::color_key::build_mask(template, &config.detection_mask)?;
    crate::corners::detect_corners(&mask, config.overscan, config.recenter)
}

pub(crate) fn require_non_empty(what: &str, image: &RgbImage) -> Result<(), PipelineError> {
    if Dimensions::of(image).is_empty() {
        return Err(PipelineError::InvalidInput(format!(
            "{what} has zero area ({})",
            Dimensions::of(image)
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgb;

    use super::*;
    use crate::types::Point;

    const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
    const BEZEL: Rgb<u8> = Rgb([30, 30, 30]);
    const BLUE: Rgb<u8> = Rgb([20, 40, 220]);

    /// 120x100 dark template with a green screen at 20..100 x 15..85.
    fn template() -> RgbImage {
        RgbImage::from_fn(120, 100, |x, y| {
            if (20..100).contains(&x) && (15..85).contains(&y) {
                GREEN
            } else {
                BEZEL
            }
        })
    }

    fn cached() -> QuadCorners {
        QuadCorners::new([
            Point::new(20.0, 15.0),
            Point::new(100.0, 15.0),
            Point::new(100.0, 85.0),
            Point::new(20.0, 85.0),
        ])
    }

    /// Feathering can leave interior weights a hair below one.
    fn assert_close(actual: &Rgb<u8>, expected: Rgb<u8>) {
        let diff = actual.0.iter().zip(expected.0).map(|(a, e)| a.abs_diff(e)).max();
        assert!(diff <= Some(1), "{actual:?} is not close to {expected:?}");
    }

    fn fast_config() -> MockupConfig {
        MockupConfig {
            interpolation: crate::warp::Interpolation::Linear,
            ..MockupConfig::default()
        }
    }

    #[test]
    fn pending_exposes_inputs() {
        let pending = Pipeline::new(RgbImage::new(4, 3), template(), fast_config());
        assert_eq!(pending.screenshot().dimensions(), (4, 3));
        assert_eq!(pending.template().dimensions(), (120, 100));
        assert_eq!(pending.config(), &fast_config());
    }

    #[test]
    fn cached_corners_skip_detection() {
        // A template without any key color: detection would fail.
        let plain = RgbImage::from_pixel(120, 100, BEZEL);
        let located = Pipeline::new(RgbImage::from_pixel(8, 8, BLUE), plain, fast_config())
            .locate(Some(&cached()))
            .unwrap();
        assert_eq!(located.source(), CornerSource::Cached);
        assert_eq!(located.corners(), cached());
    }

    #[test]
    fn detection_runs_without_cache() {
        let located = Pipeline::new(RgbImage::from_pixel(8, 8, BLUE), template(), fast_config())
            .locate(None)
            .unwrap();
        assert!(matches!(located.source(), CornerSource::Fallback(_)));
        let c = located.corners();
        assert!(c.top_left().distance(Point::new(20.0, 15.0)) < 3.0);
        assert!(c.bottom_right().distance(Point::new(99.0, 84.0)) < 3.0);
    }

    #[test]
    fn missing_key_is_no_contour() {
        let plain = RgbImage::from_pixel(50, 50, BEZEL);
        let result = Pipeline::new(RgbImage::from_pixel(8, 8, BLUE), plain, fast_config()).locate(None);
        assert!(matches!(result, Err(PipelineError::NoContourFound)));
    }

    #[test]
    fn empty_screenshot_is_invalid_input() {
        let result = Pipeline::new(RgbImage::new(0, 0), template(), fast_config()).locate(None);
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
    }

    #[test]
    fn invalid_config_is_rejected_before_work() {
        let config = MockupConfig {
            overscan: -1.0,
            ..fast_config()
        };
        let result = Pipeline::new(RgbImage::new(4, 4), template(), config).locate(None);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn warp_fills_canvas_at_template_size() {
        let warped = Pipeline::new(RgbImage::from_pixel(40, 35, BLUE), template(), fast_config())
            .locate(Some(&cached()))
            .unwrap()
            .warp()
            .unwrap();
        assert_eq!(warped.warped().dimensions(), (120, 100));
        assert_close(warped.warped().get_pixel(60, 50), BLUE);
        assert_eq!(warped.warped().get_pixel(5, 5), &Rgb([0, 0, 0]));
        let corner = warped.homography().apply(Point::new(40.0, 35.0));
        assert!(corner.distance(Point::new(100.0, 85.0)) < 1e-2);
    }

    #[test]
    fn screenshot_width_rescales_before_warp() {
        let config = MockupConfig {
            screenshot_width: Some(20),
            ..fast_config()
        };
        let warped = Pipeline::new(RgbImage::from_pixel(40, 30, BLUE), template(), config)
            .locate(Some(&cached()))
            .unwrap()
            .warp()
            .unwrap();
        assert_eq!(warped.screenshot().dimensions(), (20, 15));
        assert!(warped.rescaled());
    }

    #[test]
    fn screenshot_at_target_width_is_not_resampled() {
        let shot = RgbImage::from_fn(20, 15, |x, y| Rgb([(x * 12) as u8, (y * 16) as u8, 90]));
        let config = MockupConfig {
            screenshot_width: Some(20),
            ..fast_config()
        };
        let warped = Pipeline::new(shot.clone(), template(), config)
            .locate(Some(&cached()))
            .unwrap()
            .warp()
            .unwrap();
        assert!(!warped.rescaled());
        assert_eq!(warped.screenshot(), &shot);

        let unconfigured = Pipeline::new(shot, template(), fast_config())
            .locate(Some(&cached()))
            .unwrap()
            .warp()
            .unwrap();
        assert!(!unconfigured.rescaled());
    }

    #[test]
    fn composite_keeps_bezel_and_fills_screen() {
        let result = Pipeline::new(RgbImage::from_pixel(40, 35, BLUE), template(), fast_config())
            .locate(Some(&cached()))
            .unwrap()
            .warp()
            .unwrap()
            .composite()
            .unwrap()
            .into_result();
        assert_eq!(result.composite.dimensions(), (120, 100));
        assert_eq!(result.dimensions, Dimensions::of(&template()));
        assert_close(result.composite.get_pixel(60, 50), BLUE);
        assert_eq!(result.composite.get_pixel(3, 3), &BEZEL);
    }

    #[test]
    fn bezel_preset_uses_template_alpha() {
        let composited = Pipeline::new(
            RgbImage::from_pixel(40, 35, BLUE),
            template(),
            MockupConfig::bezel_blend(),
        )
        .locate(Some(&cached()))
        .unwrap()
        .warp()
        .unwrap()
        .composite()
        .unwrap();
        // Keyed screen interior is fully opaque, the far bezel is not.
        assert!(composited.alpha().get(60, 50).unwrap() > 0.99);
        assert!(composited.alpha().get(2, 2).unwrap().abs() < f32::EPSILON);
        assert_close(composited.composite().get_pixel(60, 50), BLUE);
        assert_eq!(composited.composite().get_pixel(2, 2), &BEZEL);
    }
}
