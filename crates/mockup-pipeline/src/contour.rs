//! Contour extraction: the outer boundary of the keyed screen region.
//!
//! Wraps `imageproc::contours::find_contours` (Suzuki-Abe border
//! following) and keeps only outermost borders, so holes inside the
//! screen region (status-bar cutouts, glare) never compete with the
//! screen outline. Straight runs are compressed to their end points, so
//! axis-aligned stretches of a staircase edge contribute one point per
//! step rather than one per pixel.

use image::GrayImage;
use imageproc::contours::BorderType;
use imageproc::point::Point as PixelPoint;

use crate::types::Point;

/// An ordered closed boundary in integer pixel coordinates.
pub type Contour = Vec<PixelPoint<i32>>;

/// All outermost contours of the non-zero region of `mask`.
#[must_use]
pub fn external_contours(mask: &GrayImage) -> Vec<Contour> {
    imageproc::contours::find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| compress_runs(&c.points))
        .collect()
}

/// Drop every point whose incoming and outgoing steps point the same way,
/// keeping only the vertices where the boundary changes direction.
///
/// Contours of fewer than three points are returned unchanged.
#[must_use]
pub fn compress_runs(points: &[PixelPoint<i32>]) -> Contour {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }
    let step = |from: PixelPoint<i32>, to: PixelPoint<i32>| (to.x - from.x, to.y - from.y);
    let kept: Contour = (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            step(prev, points[i]) != step(points[i], next)
        })
        .map(|i| points[i])
        .collect();
    // Only a contour of repeated points has no turns.
    if kept.is_empty() { points.to_vec() } else { kept }
}

/// The external contour enclosing the largest area, if any.
///
/// Ties keep the first contour found (top-most, then left-most start).
#[must_use]
pub fn largest_external_contour(mask: &GrayImage) -> Option<Contour> {
    let mut best: Option<(f64, Contour)> = None;
    for contour in external_contours(mask) {
        let area = polygon_area(&contour);
        if best.as_ref().is_none_or(|(a, _)| area > *a) {
            best = Some((area, contour));
        }
    }
    best.map(|(_, contour)| contour)
}

/// Area-weighted moments of a closed polygon (Green's theorem).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    /// Signed area.
    pub m00: f64,
    /// First moment about the y axis.
    pub m10: f64,
    /// First moment about the x axis.
    pub m01: f64,
}

impl Moments {
    /// Compute the moments of the polygon traced by `points`.
    #[must_use]
    pub fn of(points: &[PixelPoint<i32>]) -> Self {
        let n = points.len();
        let mut m00 = 0.0;
        let mut m10 = 0.0;
        let mut m01 = 0.0;
        for i in 0..n {
            let a = points[i];
            let b = points[(i + 1) % n];
            let (ax, ay) = (f64::from(a.x), f64::from(a.y));
            let (bx, by) = (f64::from(b.x), f64::from(b.y));
            let cross = ax.mul_add(by, -(bx * ay));
            m00 += cross;
            m10 += (ax + bx) * cross;
            m01 += (ay + by) * cross;
        }
        Self {
            m00: m00 / 2.0,
            m10: m10 / 6.0,
            m01: m01 / 6.0,
        }
    }

    /// Area centroid, or `None` when the polygon encloses no area.
    #[must_use]
    pub fn centroid(&self) -> Option<Point> {
        if self.m00.abs() < f64::EPSILON {
            return None;
        }
        Some(Point::new(self.m10 / self.m00, self.m01 / self.m00))
    }
}

/// Unsigned area of the polygon traced by `points`.
#[must_use]
pub fn polygon_area(points: &[PixelPoint<i32>]) -> f64 {
    Moments::of(points).m00.abs()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn filled_rect(w: u32, h: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
                image::Luma([255])
            } else {
                image::Luma([0])
            }
        })
    }

    #[test]
    fn empty_mask_has_no_contours() {
        let mask = GrayImage::new(10, 10);
        assert!(external_contours(&mask).is_empty());
        assert!(largest_external_contour(&mask).is_none());
    }

    #[test]
    fn rectangle_boundary_area_and_centroid() {
        // Pixels 5..15 on both axes: boundary centers span 5..=14.
        let mask = filled_rect(20, 20, 5, 5, 15, 15);
        let contour = largest_external_contour(&mask).unwrap();
        assert!((polygon_area(&contour) - 81.0).abs() < 1e-9);
        let c = Moments::of(&contour).centroid().unwrap();
        assert!((c.x - 9.5).abs() < 1e-9);
        assert!((c.y - 9.5).abs() < 1e-9);
    }

    #[test]
    fn rectangle_compresses_to_its_corners() {
        let mask = filled_rect(20, 20, 5, 5, 15, 15);
        let mut contour = largest_external_contour(&mask).unwrap();
        contour.sort_by_key(|p| (p.y, p.x));
        assert_eq!(
            contour,
            [
                PixelPoint::new(5, 5),
                PixelPoint::new(14, 5),
                PixelPoint::new(5, 14),
                PixelPoint::new(14, 14),
            ]
        );
    }

    #[test]
    fn staircase_keeps_one_point_per_turn() {
        // Two steps right, one down, repeated: every turn survives and the
        // interior of each horizontal run is dropped.
        let points = vec![
            PixelPoint::new(0, 0),
            PixelPoint::new(1, 0),
            PixelPoint::new(2, 0),
            PixelPoint::new(2, 1),
            PixelPoint::new(3, 1),
            PixelPoint::new(4, 1),
            PixelPoint::new(4, 2),
            PixelPoint::new(2, 2),
            PixelPoint::new(0, 2),
            PixelPoint::new(0, 1),
        ];
        let compressed = compress_runs(&points);
        assert!(!compressed.contains(&PixelPoint::new(1, 0)));
        assert!(!compressed.contains(&PixelPoint::new(3, 1)));
        assert!(!compressed.contains(&PixelPoint::new(0, 1)));
        assert!(compressed.contains(&PixelPoint::new(2, 1)));
        assert!((polygon_area(&compressed) - polygon_area(&points)).abs() < 1e-9);
    }

    #[test]
    fn tiny_contours_are_not_compressed() {
        let single = vec![PixelPoint::new(3, 3)];
        assert_eq!(compress_runs(&single), single);
        let pair = vec![PixelPoint::new(3, 3), PixelPoint::new(4, 3)];
        assert_eq!(compress_runs(&pair), pair);
    }

    #[test]
    fn holes_are_not_external() {
        // A ring: outer square with a hollow middle.
        let mut mask = filled_rect(30, 30, 5, 5, 25, 25);
        for y in 10..20 {
            for x in 10..20 {
                mask.put_pixel(x, y, image::Luma([0]));
            }
        }
        let contours = external_contours(&mask);
        assert_eq!(contours.len(), 1, "only the outer ring border is external");
    }

    #[test]
    fn largest_region_wins() {
        let mut mask = filled_rect(40, 40, 2, 2, 6, 6);
        for y in 15..35 {
            for x in 15..35 {
                mask.put_pixel(x, y, image::Luma([255]));
            }
        }
        let contour = largest_external_contour(&mask).unwrap();
        assert!(contour.iter().all(|p| p.x >= 15 && p.y >= 15));
    }

    #[test]
    fn degenerate_polygon_has_no_centroid() {
        let line = vec![PixelPoint::new(0, 0), PixelPoint::new(5, 0)];
        assert!(Moments::of(&line).centroid().is_none());
        let single = vec![PixelPoint::new(3, 3)];
        assert!(Moments::of(&single).centroid().is_none());
    }

    #[test]
    fn moments_independent_of_orientation() {
        let ccw = vec![
            PixelPoint::new(0, 0),
            PixelPoint::new(4, 0),
            PixelPoint::new(4, 2),
            PixelPoint::new(0, 2),
        ];
        let cw: Vec<_> = ccw.iter().rev().copied().collect();
        let a = Moments::of(&ccw).centroid().unwrap();
        let b = Moments::of(&cw).centroid().unwrap();
        assert!(a.distance(b) < 1e-12);
        assert!((a.x - 2.0).abs() < 1e-12 && (a.y - 1.0).abs() < 1e-12);
    }
}
