//! Shared types for the mockup compositing pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::color_key::{Cleanup, Hsv, HsvRange, MaskConfig};
use crate::composite::AlphaStrategy;
use crate::corners::{FallbackReason, RecenterStrategy};
use crate::warp::{BorderMode, Interpolation};

/// Re-export `GrayImage` so downstream crates can reference masks
/// without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can reference screenshots,
/// templates and composites without depending on `image` directly.
pub use image::RgbImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of any `image` buffer.
    #[must_use]
    pub fn of<I: image::GenericImageView>(image: &I) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// The four corners of a screen region.
///
/// Stored in canonical order: top-left, top-right, bottom-right,
/// bottom-left. Serializes as `[[x, y], [x, y], [x, y], [x, y]]`, the
/// format used by layout files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f64; 2]; 4]", into = "[[f64; 2]; 4]")]
pub struct QuadCorners([Point; 4]);

impl QuadCorners {
    /// Wrap four points that are already in canonical order.
    ///
    /// Use [`from_unordered`](Self::from_unordered) when the order is
    /// not known.
    #[must_use]
    pub const fn new(points: [Point; 4]) -> Self {
        Self(points)
    }

    /// Canonically order four arbitrary points.
    #[must_use]
    pub fn from_unordered(points: [Point; 4]) -> Self {
        crate::order::order_corners(points)
    }

    /// All four corners as (TL, TR, BR, BL).
    #[must_use]
    pub const fn points(&self) -> &[Point; 4] {
        &self.0
    }

    #[must_use]
    pub const fn top_left(&self) -> Point {
        self.0[0]
    }

    #[must_use]
    pub const fn top_right(&self) -> Point {
        self.0[1]
    }

    #[must_use]
    pub const fn bottom_right(&self) -> Point {
        self.0[2]
    }

    #[must_use]
    pub const fn bottom_left(&self) -> Point {
        self.0[3]
    }

    /// Mean of the four corners.
    #[must_use]
    pub fn center(&self) -> Point {
        let (sx, sy) = self
            .0
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point::new(sx / 4.0, sy / 4.0)
    }

    /// Enclosed area (shoelace formula, always non-negative).
    #[must_use]
    pub fn area(&self) -> f64 {
        let mut twice = 0.0;
        for i in 0..4 {
            let a = self.0[i];
            let b = self.0[(i + 1) % 4];
            twice += a.x.mul_add(b.y, -(b.x * a.y));
        }
        twice.abs() / 2.0
    }

    /// Scale every corner away from (or towards) the mean center.
    ///
    /// Scaling by `f` multiplies the enclosed area by `f²`.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        let c = self.center();
        Self(self.0.map(|p| {
            Point::new(
                (p.x - c.x).mul_add(factor, c.x),
                (p.y - c.y).mul_add(factor, c.y),
            )
        }))
    }

    /// Shift every corner by `(dx, dy)`.
    #[must_use]
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self(self.0.map(|p| Point::new(p.x + dx, p.y + dy)))
    }

    /// Whether the corners, taken in order, form a strictly convex
    /// quadrilateral.
    #[must_use]
    pub fn is_convex(&self) -> bool {
        let mut orientation: Option<bool> = None;
        for i in 0..4 {
            let a = self.0[i];
            let b = self.0[(i + 1) % 4];
            let c = self.0[(i + 2) % 4];
            let cross = (b.x - a.x).mul_add(c.y - b.y, -((b.y - a.y) * (c.x - b.x)));
            if cross.abs() < f64::EPSILON {
                return false;
            }
            let positive = cross > 0.0;
            match orientation {
                None => orientation = Some(positive),
                Some(o) if o != positive => return false,
                Some(_) => {}
            }
        }
        true
    }
}

impl From<[[f64; 2]; 4]> for QuadCorners {
    fn from(raw: [[f64; 2]; 4]) -> Self {
        Self(raw.map(|[x, y]| Point::new(x, y)))
    }
}

impl From<QuadCorners> for [[f64; 2]; 4] {
    fn from(quad: QuadCorners) -> Self {
        quad.0.map(|p| [p.x, p.y])
    }
}

/// Configuration for the mockup pipeline.
///
/// One struct drives both compositing styles: [`Default`] reproduces the
/// geometry-alpha renderer and [`bezel_blend`](Self::bezel_blend) the
/// appearance-alpha renderer. Call [`validate`](Self::validate) before
/// use; [`crate::render_mockup`] does so automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockupConfig {
    /// Color key and cleanup used to isolate the screen region when
    /// corners must be detected.
    pub detection_mask: MaskConfig,

    /// Uniform outward scale applied to detected corners about their
    /// mean. Hides the one-pixel seam left by interpolation at the
    /// screen boundary.
    pub overscan: f64,

    /// Centroid correction applied to detected corners.
    pub recenter: RecenterStrategy,

    /// Resampling filter for the perspective warp.
    pub interpolation: Interpolation,

    /// What the warp writes outside the screenshot.
    pub border: BorderMode,

    /// How the blend weights are derived.
    pub alpha: AlphaStrategy,

    /// Rescale the screenshot to this width (aspect preserved) before
    /// warping. `None` keeps the original size.
    pub screenshot_width: Option<u32>,
}

impl MockupConfig {
    /// Default overscan factor (1%).
    pub const DEFAULT_OVERSCAN: f64 = 1.01;

    /// Default feather kernel for geometry alpha.
    pub const DEFAULT_GEOMETRY_FEATHER: u32 = 5;

    /// Default feather kernel for appearance alpha.
    pub const DEFAULT_APPEARANCE_FEATHER: u32 = 3;

    /// Default interpolation.
    pub const DEFAULT_INTERPOLATION: Interpolation = Interpolation::Cubic;

    /// Default border mode.
    pub const DEFAULT_BORDER: BorderMode = BorderMode::Transparent;

    /// Default recentering strategy.
    pub const DEFAULT_RECENTER: RecenterStrategy = RecenterStrategy::Horizontal;

    /// Default (permissive) green key used for corner detection.
    pub const DEFAULT_DETECTION_KEY: HsvRange =
        HsvRange::new(Hsv::new(30, 40, 40), Hsv::new(90, 255, 255));

    /// Stricter green key used for appearance alpha.
    pub const DEFAULT_APPEARANCE_KEY: HsvRange =
        HsvRange::new(Hsv::new(35, 100, 50), Hsv::new(85, 255, 255));

    /// Appearance-alpha preset: the blend mask comes from the template's
    /// own green region, opened, dilated two steps into the bezel and
    /// lightly feathered. The warp uses bilinear filtering and replicates
    /// the screenshot edge so the dilated band is filled.
    #[must_use]
    pub fn bezel_blend() -> Self {
        Self {
            interpolation: Interpolation::Linear,
            border: BorderMode::Replicate,
            alpha: AlphaStrategy::Appearance(MaskConfig {
                key: Self::DEFAULT_APPEARANCE_KEY,
                cleanup: Cleanup::Open,
                dilate_iterations: 2,
                feather_kernel: Self::DEFAULT_APPEARANCE_FEATHER,
            }),
            ..Self::default()
        }
    }

    /// Check every field for values the pipeline cannot honor.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the first
    /// offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.overscan.is_finite() || self.overscan <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "overscan must be finite and positive, got {}",
                self.overscan
            )));
        }
        self.detection_mask.validate("detection_mask")?;
        match &self.alpha {
            AlphaStrategy::Geometry { feather_kernel } => {
                crate::blur::validate_kernel("alpha.feather_kernel", *feather_kernel)?;
            }
            AlphaStrategy::Appearance(mask) => mask.validate("alpha")?,
        }
        if self.screenshot_width == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "screenshot_width must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MockupConfig {
    fn default() -> Self {
        Self {
            detection_mask: MaskConfig {
                key: Self::DEFAULT_DETECTION_KEY,
                cleanup: Cleanup::None,
                dilate_iterations: 0,
                feather_kernel: 0,
            },
            overscan: Self::DEFAULT_OVERSCAN,
            recenter: Self::DEFAULT_RECENTER,
            interpolation: Self::DEFAULT_INTERPOLATION,
            border: Self::DEFAULT_BORDER,
            alpha: AlphaStrategy::Geometry {
                feather_kernel: Self::DEFAULT_GEOMETRY_FEATHER,
            },
            screenshot_width: None,
        }
    }
}

/// Where the corners used for a composite came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CornerSource {
    /// Supplied by the caller (a cached layout entry).
    Cached,
    /// Found by boundary line fitting.
    Detected,
    /// Estimated from the oriented bounding box after line fitting
    /// degenerated.
    Fallback(FallbackReason),
}

impl CornerSource {
    /// Whether the corners were computed in this run and should be
    /// persisted by the caller.
    #[must_use]
    pub const fn is_computed(self) -> bool {
        !matches!(self, Self::Cached)
    }
}

/// Result of rendering one screenshot into one template.
#[derive(Debug, Clone)]
pub struct MockupResult {
    /// The final composite, same size as the template.
    pub composite: RgbImage,
    /// Corners the screenshot was warped onto.
    pub corners: QuadCorners,
    /// Whether the corners were cached, detected or estimated.
    pub source: CornerSource,
    /// Template dimensions in pixels.
    pub dimensions: Dimensions,
}

/// Errors that can occur while building a mockup.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode or encode an image.
    #[error("image codec error: {0}")]
    Codec(#[from] image::ImageError),

    /// An input image or byte buffer was empty.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Pipeline configuration is invalid.
    #[error("invalid mockup configuration: {0}")]
    InvalidConfig(String),

    /// The color-key mask has no connected region with area.
    #[error("no color-keyed screen region found")]
    NoContourFound,

    /// The destination corners admit no perspective mapping.
    #[error("degenerate corners: no perspective mapping onto {corners:?}")]
    DegenerateHomography {
        /// The offending destination corners.
        corners: [[f64; 2]; 4],
    },

    /// Two images that must share a size do not.
    #[error("configuration error in {stage}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The stage that detected the mismatch.
        stage: &'static str,
        /// Required dimensions.
        expected: Dimensions,
        /// Dimensions actually supplied.
        actual: Dimensions,
    },
}
