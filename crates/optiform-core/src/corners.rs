//! Canonical ordering of detected page corners.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// An ordered page quadrilateral: top-left, top-right, bottom-right,
/// bottom-left. Construct through [`Corners::ordered`] so the ordering
/// invariant holds regardless of which detection strategy produced the
/// raw points.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Corners {
    pub points: [Point2<f32>; 4],
}

/// Sort four raw points into TL, TR, BR, BL: split into the top and bottom
/// pair by y, then order each pair by x.
pub fn order_points(raw: [Point2<f32>; 4]) -> [Point2<f32>; 4] {
    let mut by_y = raw;
    by_y.sort_by(|a, b| a.y.total_cmp(&b.y));

    let (mut top, mut bottom) = ([by_y[0], by_y[1]], [by_y[2], by_y[3]]);
    if top[0].x > top[1].x {
        top.swap(0, 1);
    }
    if bottom[0].x > bottom[1].x {
        bottom.swap(0, 1);
    }

    [top[0], top[1], bottom[1], bottom[0]]
}

impl Corners {
    pub fn ordered(raw: [Point2<f32>; 4]) -> Self {
        Self {
            points: order_points(raw),
        }
    }

    #[inline]
    pub fn top_left(&self) -> Point2<f32> {
        self.points[0]
    }

    #[inline]
    pub fn top_right(&self) -> Point2<f32> {
        self.points[1]
    }

    #[inline]
    pub fn bottom_right(&self) -> Point2<f32> {
        self.points[2]
    }

    #[inline]
    pub fn bottom_left(&self) -> Point2<f32> {
        self.points[3]
    }

    /// Length of the top edge.
    pub fn width(&self) -> f32 {
        (self.top_right() - self.top_left()).norm()
    }

    /// Length of the left edge.
    pub fn height(&self) -> f32 {
        (self.bottom_left() - self.top_left()).norm()
    }

    /// Long side over short side; >= 1.
    pub fn aspect(&self) -> f32 {
        let w = self.width();
        let h = self.height();
        let (long, short) = if w > h { (w, h) } else { (h, w) };
        if short <= f32::EPSILON {
            f32::INFINITY
        } else {
            long / short
        }
    }

    /// Shoelace area of the quadrilateral.
    pub fn area(&self) -> f32 {
        let p = &self.points;
        let mut acc = 0.0f32;
        for i in 0..4 {
            let q = p[(i + 1) % 4];
            acc += p[i].x * q.y - q.x * p[i].y;
        }
        acc.abs() * 0.5
    }

    /// Re-label the corners of a landscape-shaped quad so that warping to
    /// a portrait canvas reads the page upright: the old top-right becomes
    /// the new top-left and the remaining labels rotate with it. A quad
    /// that is already portrait is returned unchanged.
    pub fn into_portrait(self) -> Self {
        if self.width() <= self.height() {
            return self;
        }
        let [tl, tr, br, bl] = self.points;
        Self {
            points: [tr, br, bl, tl],
        }
    }
}
