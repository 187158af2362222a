//! From binary mask to ordered page quadrilateral: largest component,
//! convex hull, polygon approximation, min-area rectangle fallback.

use nalgebra::Point2;
use optiform_core::binary::connected_components;
use optiform_core::{Corners, GrayImage};

/// Monotone-chain convex hull. Input order is irrelevant; output is a
/// counter-clockwise ring (y down) without the closing point.
pub fn convex_hull(points: &[Point2<f32>]) -> Vec<Point2<f32>> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup_by(|a, b| a.x == b.x && a.y == b.y);
    if pts.len() < 3 {
        return pts;
    }

    fn cross(o: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f32 {
        (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
    }

    let mut lower: Vec<Point2<f32>> = Vec::new();
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<Point2<f32>> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

fn perimeter(ring: &[Point2<f32>]) -> f32 {
    let n = ring.len();
    let mut acc = 0.0f32;
    for i in 0..n {
        acc += (ring[(i + 1) % n] - ring[i]).norm();
    }
    acc
}

fn point_segment_distance(p: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f32 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 <= f32::EPSILON {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

fn douglas_peucker(chain: &[Point2<f32>], epsilon: f32, out: &mut Vec<Point2<f32>>) {
    if chain.len() < 3 {
        out.extend_from_slice(&chain[..chain.len().saturating_sub(1)]);
        return;
    }
    let (first, last) = (chain[0], chain[chain.len() - 1]);
    let mut max_dist = 0.0f32;
    let mut max_idx = 0usize;
    for (i, &p) in chain.iter().enumerate().skip(1).take(chain.len() - 2) {
        let d = point_segment_distance(p, first, last);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }
    if max_dist > epsilon {
        douglas_peucker(&chain[..=max_idx], epsilon, out);
        douglas_peucker(&chain[max_idx..], epsilon, out);
    } else {
        out.push(first);
    }
}

/// Douglas-Peucker simplification of a closed ring. The ring is anchored at
/// its two mutually farthest vertices so the split chains are stable.
pub fn approx_polygon(ring: &[Point2<f32>], epsilon: f32) -> Vec<Point2<f32>> {
    let n = ring.len();
    if n <= 4 {
        return ring.to_vec();
    }

    let (mut ia, mut ib, mut best) = (0usize, 0usize, -1.0f32);
    for i in 0..n {
        for j in i + 1..n {
            let d = (ring[j] - ring[i]).norm_squared();
            if d > best {
                best = d;
                ia = i;
                ib = j;
            }
        }
    }

    let mut chain_a: Vec<Point2<f32>> = Vec::with_capacity(n);
    let mut k = ia;
    loop {
        chain_a.push(ring[k]);
        if k == ib {
            break;
        }
        k = (k + 1) % n;
    }
    let mut chain_b: Vec<Point2<f32>> = Vec::with_capacity(n);
    let mut k = ib;
    loop {
        chain_b.push(ring[k]);
        if k == ia {
            break;
        }
        k = (k + 1) % n;
    }

    let mut out = Vec::new();
    douglas_peucker(&chain_a, epsilon, &mut out);
    douglas_peucker(&chain_b, epsilon, &mut out);
    out
}

/// Minimum-area enclosing rectangle by rotating calipers over hull edges.
/// Needs at least 3 hull points.
pub fn min_area_rect(hull: &[Point2<f32>]) -> Option<[Point2<f32>; 4]> {
    if hull.len() < 3 {
        return None;
    }
    let n = hull.len();
    let mut best: Option<(f32, [Point2<f32>; 4])> = None;

    for i in 0..n {
        let edge = hull[(i + 1) % n] - hull[i];
        let len = edge.norm();
        if len <= f32::EPSILON {
            continue;
        }
        let u = edge / len;
        let v = nalgebra::Vector2::new(-u.y, u.x);

        let (mut min_u, mut max_u) = (f32::INFINITY, f32::NEG_INFINITY);
        let (mut min_v, mut max_v) = (f32::INFINITY, f32::NEG_INFINITY);
        for p in hull {
            let d = p.coords;
            let su = d.dot(&u);
            let sv = d.dot(&v);
            min_u = min_u.min(su);
            max_u = max_u.max(su);
            min_v = min_v.min(sv);
            max_v = max_v.max(sv);
        }

        let area = (max_u - min_u) * (max_v - min_v);
        if best.as_ref().map(|(a, _)| area < *a).unwrap_or(true) {
            let corner = |su: f32, sv: f32| Point2::from(u * su + v * sv);
            best = Some((
                area,
                [
                    corner(min_u, min_v),
                    corner(max_u, min_v),
                    corner(max_u, max_v),
                    corner(min_u, max_v),
                ],
            ));
        }
    }
    best.map(|(_, rect)| rect)
}

/// Shared tail of every mask-based strategy: largest connected region ->
/// convex hull -> 4-vertex approximation (min-area rectangle when the
/// approximation refuses to settle on 4) -> canonical ordering.
///
/// `min_area_px` rejects components whose bounding box is too small to be
/// the page before any geometry runs. The box, not the pixel count, is the
/// gate: edge strategies produce thin border rings that enclose the page
/// without filling it.
pub fn quad_from_mask(mask: &GrayImage, min_area_px: usize, epsilon_frac: f32) -> Option<Corners> {
    let map = connected_components(mask);
    let largest = map.largest()?;
    if largest.w * largest.h < min_area_px {
        return None;
    }

    let pts = map.row_extremes(largest.label);
    let hull = convex_hull(&pts);
    if hull.len() < 3 {
        return None;
    }

    let eps = epsilon_frac * perimeter(&hull);
    let approx = approx_polygon(&hull, eps);

    let raw: [Point2<f32>; 4] = if approx.len() == 4 {
        [approx[0], approx[1], approx[2], approx[3]]
    } else {
        min_area_rect(&hull)?
    };
    Some(Corners::ordered(raw))
}
