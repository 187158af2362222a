//! Gradient-voting circular Hough transform.
//!
//! Edge pixels vote for circle centres along their gradient direction over
//! the whole radius window, in both polarities, so printed outlines and
//! solid pencil fills accumulate the same way. Centre peaks are thinned by
//! a minimum mutual distance; the radius of each surviving centre is read
//! off a distance histogram of the supporting edge pixels.

use serde::{Deserialize, Serialize};

use optiform_core::filter::sobel;
use optiform_core::GrayImage;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Circle {
    pub cx: f32,
    pub cy: f32,
    pub r: f32,
    /// Accumulator support for the centre.
    pub votes: u32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct HoughCircleConfig {
    /// Sobel magnitude floor for a pixel to vote.
    pub edge_threshold: f32,
    /// Minimum centre votes to consider a peak.
    pub accumulator_threshold: u32,
    /// Minimum distance between accepted centres, in pixels.
    pub min_center_distance: f32,
}

impl Default for HoughCircleConfig {
    fn default() -> Self {
        Self {
            edge_threshold: 120.0,
            accumulator_threshold: 20,
            min_center_distance: 8.0,
        }
    }
}

/// Detect circles with radii in `[min_radius, max_radius]`.
pub fn hough_circles(
    gray: &GrayImage,
    min_radius: usize,
    max_radius: usize,
    cfg: &HoughCircleConfig,
) -> Vec<Circle> {
    let (w, h) = (gray.width, gray.height);
    if w == 0 || h == 0 || min_radius == 0 || max_radius < min_radius {
        return Vec::new();
    }

    let gradients = sobel(gray);

    // collect edge pixels once; they are reused for radius estimation
    let mut edge_points: Vec<(usize, usize, f32, f32)> = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            let gx = gradients.gx[i];
            let gy = gradients.gy[i];
            let mag = (gx * gx + gy * gy).sqrt();
            if mag > cfg.edge_threshold {
                edge_points.push((x, y, gx / mag, gy / mag));
            }
        }
    }
    if edge_points.is_empty() {
        return Vec::new();
    }

    // centre accumulator at pixel resolution
    let mut acc = vec![0u32; w * h];
    for &(x, y, ux, uy) in &edge_points {
        for r in min_radius..=max_radius {
            let rf = r as f32;
            for sign in [-1.0f32, 1.0] {
                let cx = (x as f32 + sign * rf * ux).round() as i32;
                let cy = (y as f32 + sign * rf * uy).round() as i32;
                if cx >= 0 && cy >= 0 && (cx as usize) < w && (cy as usize) < h {
                    acc[cy as usize * w + cx as usize] += 1;
                }
            }
        }
    }

    // local maxima above the vote floor
    let mut peaks: Vec<(u32, usize, usize)> = Vec::new();
    for y in 1..h.saturating_sub(1) {
        for x in 1..w.saturating_sub(1) {
            let v = acc[y * w + x];
            if v < cfg.accumulator_threshold {
                continue;
            }
            let mut is_max = true;
            'win: for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let n = acc[(y as i32 + dy) as usize * w + (x as i32 + dx) as usize];
                    if n > v || (n == v && (dy < 0 || (dy == 0 && dx < 0))) {
                        // strict tie-break keeps exactly one pixel per plateau
                        is_max = false;
                        break 'win;
                    }
                }
            }
            if is_max {
                peaks.push((v, x, y));
            }
        }
    }
    peaks.sort_by(|a, b| b.0.cmp(&a.0).then(a.2.cmp(&b.2)).then(a.1.cmp(&b.1)));

    // greedy minimum-distance thinning, strongest first
    let min_dist2 = cfg.min_center_distance * cfg.min_center_distance;
    let mut centers: Vec<(u32, usize, usize)> = Vec::new();
    for &(v, x, y) in &peaks {
        let far_enough = centers.iter().all(|&(_, kx, ky)| {
            let dx = x as f32 - kx as f32;
            let dy = y as f32 - ky as f32;
            dx * dx + dy * dy >= min_dist2
        });
        if far_enough {
            centers.push((v, x, y));
        }
    }

    // radius per centre from the supporting edge distances
    let mut out = Vec::with_capacity(centers.len());
    let reach = max_radius as f32 + 2.0;
    for (votes, cx, cy) in centers {
        let mut histogram = vec![0u32; max_radius + 3];
        for &(x, y, _, _) in &edge_points {
            let dx = x as f32 - cx as f32;
            let dy = y as f32 - cy as f32;
            let d = (dx * dx + dy * dy).sqrt();
            if d <= reach {
                histogram[d.round() as usize] += 1;
            }
        }
        let best_r = (min_radius..=max_radius)
            .max_by_key(|&r| histogram[r])
            .unwrap_or(min_radius);
        if histogram[best_r] == 0 {
            continue;
        }
        out.push(Circle {
            cx: cx as f32,
            cy: cy as f32,
            r: best_r as f32,
            votes,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw_ring(img: &mut GrayImage, cx: f32, cy: f32, r: f32, value: u8) {
        for y in 0..img.height {
            for x in 0..img.width {
                let d = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
                if (d - r).abs() <= 1.0 {
                    img.set(x, y, value);
                }
            }
        }
    }

    fn draw_disk(img: &mut GrayImage, cx: f32, cy: f32, r: f32, value: u8) {
        for y in 0..img.height {
            for x in 0..img.width {
                let d = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
                if d <= r {
                    img.set(x, y, value);
                }
            }
        }
    }

    #[test]
    fn finds_a_single_outline_ring() {
        let mut img = GrayImage::filled(64, 64, 255);
        draw_ring(&mut img, 32.0, 32.0, 10.0, 0);
        let circles = hough_circles(&img, 7, 13, &HoughCircleConfig::default());
        assert!(!circles.is_empty());
        let c = &circles[0];
        assert!((c.cx - 32.0).abs() <= 2.0);
        assert!((c.cy - 32.0).abs() <= 2.0);
        assert!((c.r - 10.0).abs() <= 2.0);
    }

    #[test]
    fn finds_a_filled_disk() {
        let mut img = GrayImage::filled(64, 64, 255);
        draw_disk(&mut img, 30.0, 28.0, 9.0, 20);
        let circles = hough_circles(&img, 6, 12, &HoughCircleConfig::default());
        assert!(!circles.is_empty());
        let c = &circles[0];
        assert!((c.cx - 30.0).abs() <= 2.0);
        assert!((c.cy - 28.0).abs() <= 2.0);
    }

    #[test]
    fn separates_neighbouring_bubbles() {
        let mut img = GrayImage::filled(120, 40, 255);
        for i in 0..5 {
            draw_ring(&mut img, 15.0 + i as f32 * 22.0, 20.0, 8.0, 0);
        }
        let cfg = HoughCircleConfig {
            min_center_distance: 10.0,
            ..HoughCircleConfig::default()
        };
        let mut circles = hough_circles(&img, 6, 11, &cfg);
        circles.sort_by(|a, b| a.cx.total_cmp(&b.cx));
        assert_eq!(circles.len(), 5);
        for (i, c) in circles.iter().enumerate() {
            assert!((c.cx - (15.0 + i as f32 * 22.0)).abs() <= 2.5);
        }
    }

    #[test]
    fn blank_image_yields_no_circles() {
        let img = GrayImage::filled(64, 64, 255);
        assert!(hough_circles(&img, 5, 12, &HoughCircleConfig::default()).is_empty());
    }

    #[test]
    fn detection_is_deterministic() {
        let mut img = GrayImage::filled(80, 80, 255);
        draw_ring(&mut img, 25.0, 30.0, 9.0, 10);
        draw_disk(&mut img, 55.0, 50.0, 8.0, 30);
        let a = hough_circles(&img, 6, 12, &HoughCircleConfig::default());
        let b = hough_circles(&img, 6, 12, &HoughCircleConfig::default());
        assert_eq!(a, b);
    }
}
