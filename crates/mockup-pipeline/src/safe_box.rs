//! Oriented bounding box fallback for corner detection.
//!
//! Used when boundary line fitting degenerates. The minimum-area rectangle
//! around the region's convex hull ignores perspective skew inside the box
//! but is defined for any non-empty region.

use image::GrayImage;
use imageproc::point::Point as PixelPoint;

use crate::contour::largest_external_contour;
use crate::order::order_corners;
use crate::types::{PipelineError, Point, QuadCorners};

/// Estimate the screen corners as the minimum-area rectangle enclosing the
/// largest region of `mask`, scaled by `overscan` and canonically ordered.
///
/// # Errors
///
/// Returns [`PipelineError::NoContourFound`] if `mask` is empty.
pub fn safe_box(mask: &GrayImage, overscan: f64) -> Result<QuadCorners, PipelineError> {
    let contour = largest_external_contour(mask).ok_or(PipelineError::NoContourFound)?;
    let rect = QuadCorners::new(min_area_rect(&contour)).scaled(overscan);
    Ok(order_corners(*rect.points()))
}

/// Minimum-area rectangle enclosing `points`.
///
/// One side of the optimal rectangle is collinear with an edge of the
/// convex hull, so every hull edge direction is tried. Corners are
/// returned in traversal order around the rectangle. A single point (or an
/// empty slice, at the origin) yields four identical corners.
#[must_use]
pub fn min_area_rect(points: &[PixelPoint<i32>]) -> [Point; 4] {
    let hull: Vec<Point> = imageproc::geometry::convex_hull(points)
        .into_iter()
        .map(|p: PixelPoint<i32>| Point::new(f64::from(p.x), f64::from(p.y)))
        .collect();

    let Some(&first) = hull.first() else {
        return [Point::new(0.0, 0.0); 4];
    };

    let mut best: Option<(f64, [Point; 4])> = None;
    for (i, &a) in hull.iter().enumerate() {
        let b = hull[(i + 1) % hull.len()];
        let len = a.distance(b);
        if len < f64::EPSILON {
            continue;
        }
        let (ux, uy) = ((b.x - a.x) / len, (b.y - a.y) / len);
        let (nx, ny) = (-uy, ux);

        let (mut min_u, mut max_u) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_n, mut max_n) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in &hull {
            let u = p.x.mul_add(ux, p.y * uy);
            let n = p.x.mul_add(nx, p.y * ny);
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_n = min_n.min(n);
            max_n = max_n.max(n);
        }

        let area = (max_u - min_u) * (max_n - min_n);
        if best.as_ref().is_none_or(|(a, _)| area < *a) {
            let corner = |u: f64, n: f64| Point::new(u.mul_add(ux, n * nx), u.mul_add(uy, n * ny));
            best = Some((
                area,
                [
                    corner(min_u, min_n),
                    corner(max_u, min_n),
                    corner(max_u, max_n),
                    corner(min_u, max_n),
                ],
            ));
        }
    }

    best.map_or([first; 4], |(_, rect)| rect)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn assert_near(a: Point, b: Point) {
        assert!(a.distance(b) < 1e-9, "{a:?} != {b:?}");
    }

    #[test]
    fn axis_aligned_square() {
        let pts = [
            PixelPoint::new(2, 3),
            PixelPoint::new(12, 3),
            PixelPoint::new(12, 13),
            PixelPoint::new(2, 13),
            PixelPoint::new(7, 8),
        ];
        let rect = QuadCorners::from_unordered(min_area_rect(&pts));
        assert_near(rect.top_left(), Point::new(2.0, 3.0));
        assert_near(rect.top_right(), Point::new(12.0, 3.0));
        assert_near(rect.bottom_right(), Point::new(12.0, 13.0));
        assert_near(rect.bottom_left(), Point::new(2.0, 13.0));
    }

    #[test]
    fn rotated_rectangle_is_tight() {
        // A 45-degree rotated square (diamond) of side 10*sqrt(2).
        let pts = [
            PixelPoint::new(10, 0),
            PixelPoint::new(20, 10),
            PixelPoint::new(10, 20),
            PixelPoint::new(0, 10),
        ];
        let rect = QuadCorners::new(min_area_rect(&pts));
        assert!((rect.area() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn single_point_is_degenerate_box() {
        let rect = min_area_rect(&[PixelPoint::new(4, 5)]);
        assert!(rect.iter().all(|p| *p == Point::new(4.0, 5.0)));
    }

    #[test]
    fn safe_box_of_filled_rectangle() {
        let mut mask = GrayImage::new(40, 30);
        for y in 5..25 {
            for x in 10..30 {
                mask.put_pixel(x, y, image::Luma([255]));
            }
        }
        // Boundary pixel centers span 10..=29 x 5..=24.
        let corners = safe_box(&mask, 1.0).unwrap();
        assert_near(corners.top_left(), Point::new(10.0, 5.0));
        assert_near(corners.bottom_right(), Point::new(29.0, 24.0));

        let grown = safe_box(&mask, 1.01).unwrap();
        assert!((grown.area() / corners.area() - 1.01 * 1.01).abs() < 1e-9);
    }

    #[test]
    fn safe_box_of_empty_mask_fails() {
        assert!(matches!(
            safe_box(&GrayImage::new(8, 8), 1.01),
            Err(PipelineError::NoContourFound)
        ));
    }
}
