//! Canonical corner ordering.

use std::cmp::Ordering;

use crate::types::{Point, QuadCorners};

/// Order four points as top-left, top-right, bottom-right, bottom-left.
///
/// The two points with the smallest `y` form the top edge and the other
/// two the bottom edge; each pair is then split by `x`. Ties are broken
/// on the other coordinate so the result does not depend on the order
/// of the input.
#[must_use]
pub fn order_corners(mut points: [Point; 4]) -> QuadCorners {
    points.sort_by(by_y_then_x);
    let [a, b, c, d] = points;
    let (tl, tr) = if by_x_then_y(&a, &b) == Ordering::Greater {
        (b, a)
    } else {
        (a, b)
    };
    let (bl, br) = if by_x_then_y(&c, &d) == Ordering::Greater {
        (d, c)
    } else {
        (c, d)
    };
    QuadCorners::new([tl, tr, br, bl])
}

fn by_y_then_x(a: &Point, b: &Point) -> Ordering {
    a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x))
}

fn by_x_then_y(a: &Point, b: &Point) -> Ordering {
    a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
}
