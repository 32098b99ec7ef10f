//! Planar homographies from four point correspondences.
//!
//! A thin layer over [`imageproc::geometric_transformations::Projection`],
//! which solves the eight unknowns of the correspondence system by SVD and
//! keeps the inverse alongside the forward matrix. This module adds the
//! collinearity checks that reject screen quads with no proper perspective
//! mapping, and the rectangle-to-quad convention used by the warp.

use imageproc::geometric_transformations::Projection;

use crate::types::{PipelineError, Point, QuadCorners};

/// Twice the triangle area below which three points count as collinear.
const COLLINEAR_AREA: f64 = 1e-6;

/// A projective transform of the plane together with its inverse.
#[derive(Debug, Clone, Copy)]
pub struct Homography {
    projection: Projection,
}

impl Homography {
    /// The identity transform.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            projection: Projection::translate(0.0, 0.0),
        }
    }

    /// The underlying projection, for handing to imageproc warps.
    #[must_use]
    pub const fn projection(&self) -> &Projection {
        &self.projection
    }

    /// The unique homography mapping each `src[i]` onto `dst[i]`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DegenerateHomography`] if any three
    /// source or destination points are collinear or the system is
    /// singular.
    pub fn from_correspondences(src: &[Point; 4], dst: &[Point; 4]) -> Result<Self, PipelineError> {
        let degenerate = || PipelineError::DegenerateHomography {
            corners: dst.map(|p| [p.x, p.y]),
        };
        if has_collinear_triple(dst) || has_collinear_triple(src) {
            return Err(degenerate());
        }
        let projection = Projection::from_control_points(src.map(to_f32), dst.map(to_f32))
            .ok_or_else(degenerate)?;
        Ok(Self { projection })
    }

    /// The homography mapping the `width` x `height` rectangle with corners
    /// (0,0), (w,0), (w,h), (0,h) onto `quad`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DegenerateHomography`] if `quad` is
    /// degenerate or the rectangle has zero area.
    pub fn rect_to_quad(width: u32, height: u32, quad: &QuadCorners) -> Result<Self, PipelineError> {
        let (w, h) = (f64::from(width), f64::from(height));
        let src = [
            Point::new(0.0, 0.0),
            Point::new(w, 0.0),
            Point::new(w, h),
            Point::new(0.0, h),
        ];
        Self::from_correspondences(&src, quad.points())
    }

    /// Map a point. Points on the line at infinity map to non-finite
    /// coordinates.
    #[must_use]
    pub fn apply(&self, p: Point) -> Point {
        let (x, y) = self.projection * to_f32(p);
        Point::new(f64::from(x), f64::from(y))
    }

    /// The inverse transform.
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self {
            projection: self.projection.invert(),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn to_f32(p: Point) -> (f32, f32) {
    (p.x as f32, p.y as f32)
}

/// Whether any three of the four points are (nearly) collinear.
fn has_collinear_triple(points: &[Point; 4]) -> bool {
    const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
    TRIPLES.iter().any(|&[i, j, k]| {
        let (a, b, c) = (points[i], points[j], points[k]);
        let twice_area = (b.x - a.x).mul_add(c.y - a.y, -((b.y - a.y) * (c.x - a.x)));
        twice_area.abs() < COLLINEAR_AREA
    })
}
