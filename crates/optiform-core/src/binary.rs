//! Binary mask operations: thresholds, rectangular morphology and
//! connected components.
//!
//! Masks reuse [`GrayImage`] with the convention 0 = off, 255 = on.

use crate::GrayImage;
use nalgebra::Point2;

/// `pixel >= thr` -> on.
pub fn threshold(gray: &GrayImage, thr: u8) -> GrayImage {
    map_mask(gray, |v| v >= thr)
}

/// `pixel < thr` -> on (inverted binarization: dark ink becomes the mask).
pub fn threshold_inv(gray: &GrayImage, thr: u8) -> GrayImage {
    map_mask(gray, |v| v < thr)
}

fn map_mask(gray: &GrayImage, pred: impl Fn(u8) -> bool) -> GrayImage {
    let mut out = GrayImage::new(gray.width, gray.height);
    for (dst, &v) in out.data.iter_mut().zip(gray.data.iter()) {
        *dst = if pred(v) { 255 } else { 0 };
    }
    out
}

pub fn mask_and(a: &GrayImage, b: &GrayImage) -> GrayImage {
    debug_assert_eq!((a.width, a.height), (b.width, b.height));
    let mut out = GrayImage::new(a.width, a.height);
    for i in 0..out.data.len() {
        out.data[i] = a.data[i] & b.data[i];
    }
    out
}

pub fn mask_or(a: &GrayImage, b: &GrayImage) -> GrayImage {
    debug_assert_eq!((a.width, a.height), (b.width, b.height));
    let mut out = GrayImage::new(a.width, a.height);
    for i in 0..out.data.len() {
        out.data[i] = a.data[i] | b.data[i];
    }
    out
}

/// Summed-area table with one row/column of zero padding.
fn integral(gray: &GrayImage) -> Vec<u64> {
    let (w, h) = (gray.width, gray.height);
    let stride = w + 1;
    let mut sat = vec![0u64; stride * (h + 1)];
    for y in 0..h {
        let mut row_acc = 0u64;
        for x in 0..w {
            row_acc += gray.data[y * w + x] as u64;
            sat[(y + 1) * stride + x + 1] = sat[y * stride + x + 1] + row_acc;
        }
    }
    sat
}

#[inline]
fn box_sum(sat: &[u64], stride: usize, x1: usize, y1: usize, x2: usize, y2: usize) -> u64 {
    // inclusive-exclusive window [x1, x2) x [y1, y2)
    sat[y2 * stride + x2] + sat[y1 * stride + x1] - sat[y1 * stride + x2] - sat[y2 * stride + x1]
}

/// Mean adaptive threshold: `pixel > local_mean - c` -> on. `block` is the
/// odd window side.
pub fn adaptive_mean(gray: &GrayImage, block: usize, c: i16) -> GrayImage {
    adaptive_impl(gray, block, c, false)
}

/// Inverted variant: `pixel <= local_mean - c` -> on.
pub fn adaptive_mean_inv(gray: &GrayImage, block: usize, c: i16) -> GrayImage {
    adaptive_impl(gray, block, c, true)
}

fn adaptive_impl(gray: &GrayImage, block: usize, c: i16, inverted: bool) -> GrayImage {
    let (w, h) = (gray.width, gray.height);
    let mut out = GrayImage::new(w, h);
    if w == 0 || h == 0 {
        return out;
    }
    let r = (block.max(1) - 1) / 2;
    let sat = integral(gray);
    let stride = w + 1;

    for y in 0..h {
        let y1 = y.saturating_sub(r);
        let y2 = (y + r + 1).min(h);
        for x in 0..w {
            let x1 = x.saturating_sub(r);
            let x2 = (x + r + 1).min(w);
            let n = ((x2 - x1) * (y2 - y1)) as u64;
            let mean = (box_sum(&sat, stride, x1, y1, x2, y2) / n) as i32;
            let above = gray.data[y * w + x] as i32 > mean - c as i32;
            out.data[y * w + x] = if above != inverted { 255 } else { 0 };
        }
    }
    out
}

/// Rectangular dilation: on if any pixel in the `k`-sided window is on.
pub fn dilate(mask: &GrayImage, k: usize) -> GrayImage {
    morph_window(mask, k, false)
}

/// Rectangular erosion: on only if the whole window is on.
pub fn erode(mask: &GrayImage, k: usize) -> GrayImage {
    morph_window(mask, k, true)
}

fn morph_window(mask: &GrayImage, k: usize, erode_mode: bool) -> GrayImage {
    let (w, h) = (mask.width, mask.height);
    let mut out = GrayImage::new(w, h);
    if w == 0 || h == 0 {
        return out;
    }
    let r = (k.max(1) - 1) / 2;

    // count on-pixels per window through the integral image
    let mut ones = GrayImage::new(w, h);
    for (dst, &v) in ones.data.iter_mut().zip(mask.data.iter()) {
        *dst = (v > 0) as u8;
    }
    let sat = integral(&ones);
    let stride = w + 1;

    for y in 0..h {
        let y1 = y.saturating_sub(r);
        let y2 = (y + r + 1).min(h);
        for x in 0..w {
            let x1 = x.saturating_sub(r);
            let x2 = (x + r + 1).min(w);
            let window = ((x2 - x1) * (y2 - y1)) as u64;
            let count = box_sum(&sat, stride, x1, y1, x2, y2);
            let on = if erode_mode {
                count == window
            } else {
                count > 0
            };
            out.data[y * w + x] = if on { 255 } else { 0 };
        }
    }
    out
}

/// Morphological closing (dilate then erode), `iters` times each.
pub fn close(mask: &GrayImage, k: usize, iters: usize) -> GrayImage {
    let mut m = mask.clone();
    for _ in 0..iters {
        m = morph_window(&m, k, false);
    }
    for _ in 0..iters {
        m = morph_window(&m, k, true);
    }
    m
}

/// Morphological opening (erode then dilate), `iters` times each.
pub fn open(mask: &GrayImage, k: usize, iters: usize) -> GrayImage {
    let mut m = mask.clone();
    for _ in 0..iters {
        m = morph_window(&m, k, true);
    }
    for _ in 0..iters {
        m = morph_window(&m, k, false);
    }
    m
}

/// One 4-connected region of on-pixels.
#[derive(Clone, Copy, Debug)]
pub struct Component {
    pub label: u32,
    /// Pixel count.
    pub area: usize,
    pub x: usize,
    pub y: usize,
    pub w: usize,
    pub h: usize,
}

impl Component {
    pub fn aspect(&self) -> f32 {
        if self.h == 0 {
            f32::INFINITY
        } else {
            self.w as f32 / self.h as f32
        }
    }
}

/// Label map plus per-component summaries. Label 0 is background;
/// component `i` carries label `i + 1`.
pub struct ComponentMap {
    pub width: usize,
    pub height: usize,
    pub labels: Vec<u32>,
    pub components: Vec<Component>,
}

impl ComponentMap {
    pub fn largest(&self) -> Option<&Component> {
        self.components.iter().max_by_key(|c| c.area)
    }

    /// Leftmost and rightmost on-pixel per row of one component — exactly
    /// the point set whose convex hull equals the component's hull.
    pub fn row_extremes(&self, label: u32) -> Vec<Point2<f32>> {
        let mut out = Vec::new();
        for y in 0..self.height {
            let row = &self.labels[y * self.width..(y + 1) * self.width];
            let mut first = None;
            let mut last = None;
            for (x, &l) in row.iter().enumerate() {
                if l == label {
                    if first.is_none() {
                        first = Some(x);
                    }
                    last = Some(x);
                }
            }
            if let (Some(a), Some(b)) = (first, last) {
                out.push(Point2::new(a as f32, y as f32));
                if b != a {
                    out.push(Point2::new(b as f32, y as f32));
                }
            }
        }
        out
    }
}

/// 4-connected component labeling over on-pixels.
pub fn connected_components(mask: &GrayImage) -> ComponentMap {
    let (w, h) = (mask.width, mask.height);
    let mut labels = vec![0u32; w * h];
    let mut components = Vec::new();
    let mut stack = Vec::new();

    for start in 0..w * h {
        if mask.data[start] == 0 || labels[start] != 0 {
            continue;
        }
        let label = components.len() as u32 + 1;
        let mut area = 0usize;
        let (mut min_x, mut min_y) = (w, h);
        let (mut max_x, mut max_y) = (0usize, 0usize);

        stack.push(start);
        labels[start] = label;
        while let Some(idx) = stack.pop() {
            let (x, y) = (idx % w, idx / w);
            area += 1;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);

            let mut push = |nidx: usize| {
                if mask.data[nidx] != 0 && labels[nidx] == 0 {
                    labels[nidx] = label;
                    stack.push(nidx);
                }
            };
            if x > 0 {
                push(idx - 1);
            }
            if x + 1 < w {
                push(idx + 1);
            }
            if y > 0 {
                push(idx - w);
            }
            if y + 1 < h {
                push(idx + w);
            }
        }

        components.push(Component {
            label,
            area,
            x: min_x,
            y: min_y,
            w: max_x - min_x + 1,
            h: max_y - min_y + 1,
        });
    }

    ComponentMap {
        width: w,
        height: h,
        labels,
        components,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&str]) -> GrayImage {
        let h = rows.len();
        let w = rows[0].len();
        let mut m = GrayImage::new(w, h);
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.bytes().enumerate() {
                if ch == b'#' {
                    m.set(x, y, 255);
                }
            }
        }
        m
    }

    #[test]
    fn threshold_variants_partition_pixels() {
        let mut g = GrayImage::new(2, 1);
        g.set(0, 0, 100);
        g.set(1, 0, 200);
        let bright = threshold(&g, 150);
        let dark = threshold_inv(&g, 150);
        assert_eq!(bright.data, vec![0, 255]);
        assert_eq!(dark.data, vec![255, 0]);
    }

    #[test]
    fn closing_fills_a_small_hole() {
        let m = mask_from(&["#####", "##.##", "#####"]);
        let closed = close(&m, 3, 1);
        assert_eq!(closed.get(2, 1), 255);
    }

    #[test]
    fn opening_removes_an_isolated_speck() {
        let m = mask_from(&[".....", "..#..", ".....", "#####", "#####"]);
        let opened = open(&m, 3, 1);
        assert_eq!(opened.get(2, 1), 0);
        // the solid 2x5 block keeps its interior under a 3x3 opening at
        // the border thanks to clamped windows
        assert_eq!(opened.get(2, 4), 255);
    }

    #[test]
    fn components_are_separated_and_measured() {
        let m = mask_from(&["##..#", "##..#", ".....", "...##"]);
        let map = connected_components(&m);
        assert_eq!(map.components.len(), 3);
        let largest = map.largest().unwrap();
        assert_eq!(largest.area, 4);
        assert_eq!((largest.x, largest.y, largest.w, largest.h), (0, 0, 2, 2));
    }

    #[test]
    fn row_extremes_trace_left_and_right_edges() {
        let m = mask_from(&["#####", "#####"]);
        let map = connected_components(&m);
        let label = map.largest().unwrap().label;
        let pts = map.row_extremes(label);
        assert_eq!(pts.len(), 4);
        assert!(pts.contains(&Point2::new(0.0, 0.0)));
        assert!(pts.contains(&Point2::new(4.0, 1.0)));
    }

    #[test]
    fn adaptive_mean_tracks_illumination_gradients() {
        // bright left half, dark right half, with one locally dark pixel in
        // each half; a global threshold cannot isolate both, the local one
        // can.
        let mut g = GrayImage::new(10, 5);
        for y in 0..5 {
            for x in 0..10 {
                g.set(x, y, if x < 5 { 220 } else { 90 });
            }
        }
        g.set(2, 2, 160);
        g.set(7, 2, 30);
        let ink = adaptive_mean_inv(&g, 5, 10);
        assert_eq!(ink.get(2, 2), 255);
        assert_eq!(ink.get(7, 2), 255);
        assert_eq!(ink.get(4, 0), 0);
    }
}
