//! Corner detection by boundary line fitting.
//!
//! The screen region of a template photograph is a perspective-distorted
//! rectangle whose corners are usually rounded, occluded or blurred. Rather
//! than looking for the corners themselves, the detector fits one straight
//! line to each side of the region's outline and intersects neighbouring
//! lines to recover "virtual" corners:
//!
//! 1. Erode the mask (L-infinity radius 2) to drop feathered edge pixels.
//! 2. Take the largest external contour and its area centroid.
//! 3. Split the boundary into top/bottom/left/right buckets by which axis
//!    dominates each point's offset from the centroid.
//! 4. Fit a total-least-squares line through the middle half of each
//!    bucket, ignoring the rounded corner regions.
//! 5. Intersect adjacent lines, recenter, overscan and order.
//!
//! When a bucket is too sparse or two adjacent lines are parallel the
//! detector falls back to [`crate::safe_box`] on the original mask and
//! reports why through [`Detection::Fallback`].

use std::fmt;

use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::point::Point as PixelPoint;
use serde::{Deserialize, Serialize};

use crate::contour::{Moments, largest_external_contour};
use crate::order::order_corners;
use crate::types::{PipelineError, Point, QuadCorners};

/// L-infinity erosion radius (two passes of a 3x3 square).
pub const EROSION_RADIUS: u8 = 2;

/// A side needs at least this many boundary points to be fitted.
pub const MIN_BUCKET_POINTS: usize = 10;

/// Trimmed fits with fewer points than this use the whole bucket.
pub const MIN_FIT_POINTS: usize = 5;

/// Lines whose unit directions have a cross product below this are
/// treated as parallel.
pub const PARALLEL_TOLERANCE: f64 = 1e-5;

/// How the virtual corners are shifted towards the contour centroid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecenterStrategy {
    /// Shift horizontally only, keeping vertical skew (screen tilt) intact.
    #[default]
    Horizontal,
    /// Shift on both axes.
    Symmetric,
    /// Leave the intersections where they are.
    Disabled,
}

/// One side of the screen outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Right => "right",
        })
    }
}

/// One corner of the screen outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Corner {
    /// The two sides meeting at this corner, horizontal side first.
    #[must_use]
    pub const fn sides(self) -> (Side, Side) {
        match self {
            Self::TopLeft => (Side::Top, Side::Left),
            Self::TopRight => (Side::Top, Side::Right),
            Self::BottomRight => (Side::Bottom, Side::Right),
            Self::BottomLeft => (Side::Bottom, Side::Left),
        }
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
            Self::BottomRight => "bottom-right",
            Self::BottomLeft => "bottom-left",
        })
    }
}

/// Why line fitting was abandoned in favour of the oriented bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackReason {
    /// A side had fewer than [`MIN_BUCKET_POINTS`] boundary points.
    UnderpopulatedBucket {
        side: Side,
        count: usize,
    },
    /// The two lines meeting at `corner` do not intersect.
    ParallelBoundaries {
        corner: Corner,
    },
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnderpopulatedBucket { side, count } => {
                write!(f, "{side} side has only {count} boundary points")
            }
            Self::ParallelBoundaries { corner } => {
                write!(f, "boundary lines at the {corner} corner are parallel")
            }
        }
    }
}

/// Outcome of corner detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Detection {
    /// Corners recovered from the four fitted boundary lines.
    Detected(QuadCorners),
    /// Line fitting degenerated; corners come from the oriented bounding
    /// box of the undilated, uneroded mask.
    Fallback {
        corners: QuadCorners,
        reason: FallbackReason,
    },
}

impl Detection {
    /// The corners, regardless of which path produced them.
    #[must_use]
    pub const fn corners(&self) -> QuadCorners {
        match self {
            Self::Detected(corners) | Self::Fallback { corners, .. } => *corners,
        }
    }

    /// The fallback reason, if the bounding box was used.
    #[must_use]
    pub const fn fallback_reason(&self) -> Option<FallbackReason> {
        match self {
            Self::Detected(_) => None,
            Self::Fallback { reason, .. } => Some(*reason),
        }
    }
}

/// A line through `origin` along the unit vector `(dx, dy)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub origin: Point,
    pub dx: f64,
    pub dy: f64,
}

impl Line {
    /// Total-least-squares fit: the line through the mean of `points`
    /// along the principal axis of their covariance, which minimizes the
    /// sum of squared perpendicular distances.
    ///
    /// Returns `None` for an empty slice.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(points: &[PixelPoint<i32>]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), p| {
            (sx + f64::from(p.x), sy + f64::from(p.y))
        });
        let (mx, my) = (sx / n, sy / n);

        let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
        for p in points {
            let dx = f64::from(p.x) - mx;
            let dy = f64::from(p.y) - my;
            sxx += dx * dx;
            syy += dy * dy;
            sxy += dx * dy;
        }

        let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
        Some(Self {
            origin: Point::new(mx, my),
            dx: theta.cos(),
            dy: theta.sin(),
        })
    }

    /// Intersection with `other`, or `None` when the lines are parallel
    /// within [`PARALLEL_TOLERANCE`].
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Point> {
        let cross = self.dx.mul_add(other.dy, -(self.dy * other.dx));
        if cross.abs() < PARALLEL_TOLERANCE {
            return None;
        }
        let ox = other.origin.x - self.origin.x;
        let oy = other.origin.y - self.origin.y;
        let t = ox.mul_add(other.dy, -(oy * other.dx)) / cross;
        Some(Point::new(
            self.dx.mul_add(t, self.origin.x),
            self.dy.mul_add(t, self.origin.y),
        ))
    }
}

/// Boundary points split by side.
#[derive(Debug, Default)]
struct Buckets {
    top: Vec<PixelPoint<i32>>,
    bottom: Vec<PixelPoint<i32>>,
    left: Vec<PixelPoint<i32>>,
    right: Vec<PixelPoint<i32>>,
}

impl Buckets {
    fn classify(contour: &[PixelPoint<i32>], centroid: Point) -> Self {
        let mut buckets = Self::default();
        for &p in contour {
            let dx = f64::from(p.x) - centroid.x;
            let dy = f64::from(p.y) - centroid.y;
            let bucket = if dx.abs() > dy.abs() {
                if dx < 0.0 {
                    &mut buckets.left
                } else {
                    &mut buckets.right
                }
            } else if dy < 0.0 {
                &mut buckets.top
            } else {
                &mut buckets.bottom
            };
            bucket.push(p);
        }
        buckets
    }

    fn get(&self, side: Side) -> &[PixelPoint<i32>] {
        match side {
            Side::Top => &self.top,
            Side::Bottom => &self.bottom,
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }
}

/// Fit the boundary line of one side, or report the bucket as too sparse.
fn fit_side(side: Side, points: &[PixelPoint<i32>]) -> Result<Line, FallbackReason> {
    let count = points.len();
    if count < MIN_BUCKET_POINTS {
        return Err(FallbackReason::UnderpopulatedBucket { side, count });
    }

    // Sort along the side so the trim removes the corner regions.
    let mut sorted = points.to_vec();
    match side {
        Side::Top | Side::Bottom => sorted.sort_by_key(|p| p.x),
        Side::Left | Side::Right => sorted.sort_by_key(|p| p.y),
    }
    let trimmed = &sorted[count / 4..count * 3 / 4];
    let sample = if trimmed.len() < MIN_FIT_POINTS {
        &sorted[..]
    } else {
        trimmed
    };

    Line::fit(sample).ok_or(FallbackReason::UnderpopulatedBucket { side, count })
}

/// Shift `corners` so their mean moves towards `centroid` per `strategy`.
#[must_use]
pub fn recenter(corners: QuadCorners, centroid: Point, strategy: RecenterStrategy) -> QuadCorners {
    let virtual_center = corners.center();
    let dx = centroid.x - virtual_center.x;
    let dy = centroid.y - virtual_center.y;
    match strategy {
        RecenterStrategy::Horizontal => corners.translated(dx, 0.0),
        RecenterStrategy::Symmetric => corners.translated(dx, dy),
        RecenterStrategy::Disabled => corners,
    }
}

/// Virtual corners from line fits, before recentering and overscan.
fn fit_corners(
    contour: &[PixelPoint<i32>],
    centroid: Point,
) -> Result<QuadCorners, FallbackReason> {
    let buckets = Buckets::classify(contour, centroid);
    let top = fit_side(Side::Top, buckets.get(Side::Top))?;
    let bottom = fit_side(Side::Bottom, buckets.get(Side::Bottom))?;
    let left = fit_side(Side::Left, buckets.get(Side::Left))?;
    let right = fit_side(Side::Right, buckets.get(Side::Right))?;

    let line = |side: Side| match side {
        Side::Top => &top,
        Side::Bottom => &bottom,
        Side::Left => &left,
        Side::Right => &right,
    };
    let corner = |corner: Corner| {
        let (a, b) = corner.sides();
        line(a)
            .intersect(line(b))
            .ok_or(FallbackReason::ParallelBoundaries { corner })
    };

    Ok(QuadCorners::new([
        corner(Corner::TopLeft)?,
        corner(Corner::TopRight)?,
        corner(Corner::BottomRight)?,
        corner(Corner::BottomLeft)?,
    ]))
}

/// Locate the four screen corners of a selection mask.
///
/// `overscan` scales the result about its center; `recenter` selects the
/// centroid correction. Degenerate line fits are not errors: they yield
/// [`Detection::Fallback`] with the bounding-box estimate.
///
/// # Errors
///
/// Returns [`PipelineError::NoContourFound`] if the eroded mask has no
/// region with area.
#[tracing::instrument(level = "debug", skip(mask), fields(width = mask.width(), height = mask.height()))]
pub fn detect_corners(
    mask: &GrayImage,
    overscan: f64,
    recenter_strategy: RecenterStrategy,
) -> Result<Detection, PipelineError> {
    let eroded = imageproc::morphology::erode(mask, Norm::LInf, EROSION_RADIUS);
    let contour = largest_external_contour(&eroded).ok_or(PipelineError::NoContourFound)?;
    let centroid = Moments::of(&contour)
        .centroid()
        .ok_or(PipelineError::NoContourFound)?;
    tracing::debug!(
        points = contour.len(),
        centroid_x = centroid.x,
        centroid_y = centroid.y,
        "screen contour"
    );

    match fit_corners(&contour, centroid) {
        Ok(raw) => {
            let corners = recenter(raw, centroid, recenter_strategy).scaled(overscan);
            Ok(Detection::Detected(order_corners(*corners.points())))
        }
        Err(reason) => {
            tracing::debug!(%reason, "line fit degenerated, using oriented bounding box");
            let corners = crate::safe_box::safe_box(mask, overscan)?;
            Ok(Detection::Fallback { corners, reason })
        }
    }
}
