//! Prioritized page-boundary detection strategies.
//!
//! Each strategy turns the photograph into a candidate page quadrilateral
//! its own way; all of them funnel through the same mask-to-quad tail and
//! the same acceptance test (area fraction and aspect window), so the
//! normalizer can walk the chain and stop at the first hypothesis that
//! holds up.

use nalgebra::Point2;

use optiform_core::binary::{adaptive_mean, close, dilate, mask_and, open};
use optiform_core::filter::{edge_mask, sobel};
use optiform_core::{Corners, DebugSink, GrayImage, RgbImage};

use crate::normalizer::NormalizeConfig;
use crate::quad::quad_from_mask;

/// Detection output: ordered corners plus a confidence in `[0, 1]`
/// (currently the page-to-frame area fraction).
#[derive(Clone, Copy, Debug)]
pub struct CornerHypothesis {
    pub corners: Corners,
    pub confidence: f32,
}

/// Shared inputs so strategies do not recompute grayscale conversions.
pub struct StrategyContext<'a> {
    pub rgb: &'a RgbImage,
    pub gray: &'a GrayImage,
    /// Pre-smoothed grayscale (the normalizer's `presmooth_sigma`).
    pub blurred: &'a GrayImage,
}

pub trait CornerStrategy {
    fn name(&self) -> &'static str;

    fn detect(
        &self,
        ctx: &StrategyContext<'_>,
        cfg: &NormalizeConfig,
        sink: &mut dyn DebugSink,
    ) -> Option<CornerHypothesis>;
}

/// The six built-in strategies in priority order.
pub fn default_strategies() -> Vec<Box<dyn CornerStrategy>> {
    vec![
        Box::new(LightnessSegmentation),
        Box::new(BrightnessAdaptive),
        Box::new(SaturationValue),
        Box::new(ContrastEdges),
        Box::new(GradientMagnitude),
        Box::new(LineReconstruction),
    ]
}

fn accept_quad(
    corners: Corners,
    cfg: &NormalizeConfig,
    frame_area: f32,
    name: &str,
) -> Option<CornerHypothesis> {
    let area_frac = corners.area() / frame_area;
    if area_frac < cfg.min_area_frac {
        log::debug!("{name}: quad covers {:.1}% of frame, rejected", area_frac * 100.0);
        return None;
    }
    let aspect = corners.aspect();
    if aspect < cfg.aspect_min || aspect > cfg.aspect_max {
        log::debug!("{name}: quad aspect {aspect:.2} outside window, rejected");
        return None;
    }
    Some(CornerHypothesis {
        corners,
        confidence: area_frac.min(1.0),
    })
}

/// Paper-mask tail shared by the segmentation strategies: denoise the mask
/// with close/open, then run the hull/approx pipeline.
fn paper_quad(
    mask: &GrayImage,
    cfg: &NormalizeConfig,
    frame_area: f32,
    name: &str,
    sink: &mut dyn DebugSink,
) -> Option<CornerHypothesis> {
    let cleaned = open(
        &close(mask, cfg.paper_close_kernel, cfg.paper_close_iters),
        cfg.paper_close_kernel,
        cfg.paper_open_iters,
    );
    sink.record(&format!("normalize/{name}-mask"), &cleaned);

    let min_area_px = (cfg.min_area_frac * frame_area) as usize;
    let corners = quad_from_mask(&cleaned, min_area_px, cfg.approx_epsilon_frac)?;
    accept_quad(corners, cfg, frame_area, name)
}

/// Strategy 1: paper is bright *and* chromatically neutral. Separates the
/// white sheet from coloured desks and pen marks where a pure brightness
/// threshold cannot.
pub struct LightnessSegmentation;

impl CornerStrategy for LightnessSegmentation {
    fn name(&self) -> &'static str {
        "lightness"
    }

    fn detect(
        &self,
        ctx: &StrategyContext<'_>,
        cfg: &NormalizeConfig,
        sink: &mut dyn DebugSink,
    ) -> Option<CornerHypothesis> {
        let (w, h) = (ctx.rgb.width, ctx.rgb.height);
        let mut mask = GrayImage::new(w, h);
        for i in 0..w * h {
            let r = ctx.rgb.data[i * 3];
            let g = ctx.rgb.data[i * 3 + 1];
            let b = ctx.rgb.data[i * 3 + 2];
            let chroma = r.max(g).max(b) - r.min(g).min(b);
            if ctx.gray.data[i] >= cfg.lightness_min && chroma <= cfg.neutral_chroma_max {
                mask.data[i] = 255;
            }
        }
        paper_quad(&mask, cfg, (w * h) as f32, self.name(), sink)
    }
}

/// Strategy 2: global brightness threshold ANDed with a locally adaptive
/// threshold, so an unevenly lit sheet still yields one bright region.
pub struct BrightnessAdaptive;

impl CornerStrategy for BrightnessAdaptive {
    fn name(&self) -> &'static str {
        "brightness-adaptive"
    }

    fn detect(
        &self,
        ctx: &StrategyContext<'_>,
        cfg: &NormalizeConfig,
        sink: &mut dyn DebugSink,
    ) -> Option<CornerHypothesis> {
        let bright = optiform_core::binary::threshold(ctx.blurred, cfg.brightness_threshold);
        let local = adaptive_mean(ctx.blurred, cfg.adaptive_block, cfg.adaptive_c);
        let mask = mask_and(&bright, &local);
        let frame_area = (ctx.gray.width * ctx.gray.height) as f32;
        paper_quad(&mask, cfg, frame_area, self.name(), sink)
    }
}

/// Strategy 3: paper in HSV terms — low saturation, high value.
pub struct SaturationValue;

impl CornerStrategy for SaturationValue {
    fn name(&self) -> &'static str {
        "saturation-value"
    }

    fn detect(
        &self,
        ctx: &StrategyContext<'_>,
        cfg: &NormalizeConfig,
        sink: &mut dyn DebugSink,
    ) -> Option<CornerHypothesis> {
        let (w, h) = (ctx.rgb.width, ctx.rgb.height);
        let mut mask = GrayImage::new(w, h);
        for i in 0..w * h {
            let r = ctx.rgb.data[i * 3];
            let g = ctx.rgb.data[i * 3 + 1];
            let b = ctx.rgb.data[i * 3 + 2];
            let value = r.max(g).max(b);
            let min = r.min(g).min(b);
            let saturation = if value == 0 {
                0
            } else {
                ((value - min) as u16 * 255 / value as u16) as u8
            };
            if saturation <= cfg.saturation_max && value >= cfg.value_min {
                mask.data[i] = 255;
            }
        }
        paper_quad(&mask, cfg, (w * h) as f32, self.name(), sink)
    }
}

/// Linear contrast stretch between the 2nd and 98th intensity percentiles.
fn contrast_stretch(gray: &GrayImage) -> GrayImage {
    let mut hist = [0u32; 256];
    for &v in &gray.data {
        hist[v as usize] += 1;
    }
    let total = gray.data.len() as u32;
    if total == 0 {
        return gray.clone();
    }
    let clip = total / 50; // 2%
    let mut low = 0usize;
    let mut acc = 0u32;
    for (i, &c) in hist.iter().enumerate() {
        acc += c;
        if acc > clip {
            low = i;
            break;
        }
    }
    let mut high = 255usize;
    let mut acc = 0u32;
    for (i, &c) in hist.iter().enumerate().rev() {
        acc += c;
        if acc > clip {
            high = i;
            break;
        }
    }
    if high <= low {
        return gray.clone();
    }
    let scale = 255.0 / (high - low) as f32;
    let mut out = GrayImage::new(gray.width, gray.height);
    for (dst, &v) in out.data.iter_mut().zip(gray.data.iter()) {
        *dst = (((v as f32 - low as f32) * scale).round()).clamp(0.0, 255.0) as u8;
    }
    out
}

/// Strategy 4: contrast normalization followed by an edge map, with an
/// escalating threshold ladder for washed-out photographs.
pub struct ContrastEdges;

impl CornerStrategy for ContrastEdges {
    fn name(&self) -> &'static str {
        "contrast-edges"
    }

    fn detect(
        &self,
        ctx: &StrategyContext<'_>,
        cfg: &NormalizeConfig,
        sink: &mut dyn DebugSink,
    ) -> Option<CornerHypothesis> {
        let stretched = contrast_stretch(ctx.blurred);
        let gradients = sobel(&stretched);
        let frame_area = (ctx.gray.width * ctx.gray.height) as f32;
        let min_area_px = (cfg.min_area_frac * frame_area) as usize;

        for &thr in &cfg.edge_thresholds {
            let edges = dilate(&edge_mask(&gradients, thr), 3);
            let ring = close(&edges, cfg.edge_close_kernel, 1);
            sink.record("normalize/contrast-edges", &ring);
            let Some(corners) = quad_from_mask(&ring, min_area_px, cfg.approx_epsilon_frac)
            else {
                continue;
            };
            if let Some(hyp) = accept_quad(corners, cfg, frame_area, self.name()) {
                return Some(hyp);
            }
        }
        None
    }
}

/// Strategy 5: plain gradient-magnitude threshold, no contrast stage —
/// catches low-contrast shots where stretching amplifies sensor noise
/// faster than the page outline.
pub struct GradientMagnitude;

impl CornerStrategy for GradientMagnitude {
    fn name(&self) -> &'static str {
        "gradient-magnitude"
    }

    fn detect(
        &self,
        ctx: &StrategyContext<'_>,
        cfg: &NormalizeConfig,
        sink: &mut dyn DebugSink,
    ) -> Option<CornerHypothesis> {
        let gradients = sobel(ctx.blurred);
        let edges = dilate(&edge_mask(&gradients, cfg.gradient_threshold), 3);
        let ring = close(&edges, cfg.edge_close_kernel, 1);
        sink.record("normalize/gradient-edges", &ring);

        let frame_area = (ctx.gray.width * ctx.gray.height) as f32;
        let min_area_px = (cfg.min_area_frac * frame_area) as usize;
        let corners = quad_from_mask(&ring, min_area_px, cfg.approx_epsilon_frac)?;
        accept_quad(corners, cfg, frame_area, self.name())
    }
}

// ---- strategy 6: line reconstruction -------------------------------------

#[derive(Clone, Copy, Debug)]
struct PolarLine {
    rho: f32,
    theta_deg: usize,
    votes: u32,
}

impl PolarLine {
    fn trig(&self) -> (f32, f32) {
        let t = (self.theta_deg as f32).to_radians();
        (t.cos(), t.sin())
    }

    /// y on the line at a given x (lines with near-horizontal direction).
    fn y_at(&self, x: f32) -> f32 {
        let (c, s) = self.trig();
        (self.rho - x * c) / s
    }

    /// x on the line at a given y (lines with near-vertical direction).
    fn x_at(&self, y: f32) -> f32 {
        let (c, s) = self.trig();
        (self.rho - y * s) / c
    }
}

fn intersect(a: &PolarLine, b: &PolarLine) -> Option<Point2<f32>> {
    let (ca, sa) = a.trig();
    let (cb, sb) = b.trig();
    let det = ca * sb - sa * cb;
    if det.abs() < 1e-6 {
        return None;
    }
    let x = (a.rho * sb - b.rho * sa) / det;
    let y = (b.rho * ca - a.rho * cb) / det;
    Some(Point2::new(x, y))
}

const THETA_BINS: usize = 180;
const NMS_RHO: isize = 10;
const NMS_THETA: isize = 5;

fn hough_lines(edges: &GrayImage, vote_threshold: u32, max_lines: usize) -> Vec<PolarLine> {
    let (w, h) = (edges.width, edges.height);
    let max_rho = ((w * w + h * h) as f32).sqrt();
    let rho_bins = (2.0 * max_rho).ceil() as usize + 1;

    let mut sin_table = [0.0f32; THETA_BINS];
    let mut cos_table = [0.0f32; THETA_BINS];
    for (t, (s, c)) in sin_table.iter_mut().zip(cos_table.iter_mut()).enumerate() {
        let rad = (t as f32).to_radians();
        *s = rad.sin();
        *c = rad.cos();
    }

    let mut acc = vec![0u32; rho_bins * THETA_BINS];
    for y in 0..h {
        for x in 0..w {
            if edges.data[y * w + x] == 0 {
                continue;
            }
            for t in 0..THETA_BINS {
                let rho = x as f32 * cos_table[t] + y as f32 * sin_table[t];
                let r_idx = (rho + max_rho).round() as usize;
                acc[t * rho_bins + r_idx.min(rho_bins - 1)] += 1;
            }
        }
    }

    let get = |r: isize, t: isize| -> u32 {
        if r < 0 || r >= rho_bins as isize {
            return 0;
        }
        let t = t.rem_euclid(THETA_BINS as isize) as usize;
        acc[t * rho_bins + r as usize]
    };

    let mut peaks = Vec::new();
    for t in 0..THETA_BINS as isize {
        for r in 0..rho_bins as isize {
            let votes = get(r, t);
            if votes < vote_threshold {
                continue;
            }
            let mut is_max = true;
            'nms: for dt in -NMS_THETA..=NMS_THETA {
                for dr in -NMS_RHO..=NMS_RHO {
                    if dt == 0 && dr == 0 {
                        continue;
                    }
                    if get(r + dr, t + dt) > votes {
                        is_max = false;
                        break 'nms;
                    }
                }
            }
            if is_max {
                peaks.push(PolarLine {
                    rho: r as f32 - max_rho,
                    theta_deg: t as usize,
                    votes,
                });
            }
        }
    }
    peaks.sort_by(|a, b| b.votes.cmp(&a.votes));
    peaks.truncate(max_lines);
    peaks
}

/// Strategy 6: reconstruct the page from its straight edges. Long segments
/// are classified horizontal/vertical; the extreme top, bottom, left and
/// right lines intersect into 4 corners. Works when the page border is
/// partly occluded and no mask segmentation produces a clean region.
pub struct LineReconstruction;

const HORIZONTAL_TOLERANCE: usize = 10;
const VERTICAL_TOLERANCE: usize = 10;

impl CornerStrategy for LineReconstruction {
    fn name(&self) -> &'static str {
        "line-reconstruction"
    }

    fn detect(
        &self,
        ctx: &StrategyContext<'_>,
        cfg: &NormalizeConfig,
        sink: &mut dyn DebugSink,
    ) -> Option<CornerHypothesis> {
        let (w, h) = (ctx.gray.width, ctx.gray.height);
        let gradients = sobel(ctx.blurred);
        let edges = edge_mask(&gradients, cfg.gradient_threshold);
        sink.record("normalize/line-edges", &edges);

        let vote_threshold = ((w.min(h)) as f32 * cfg.line_vote_frac) as u32;
        let lines = hough_lines(&edges, vote_threshold.max(16), cfg.max_lines);
        if lines.len() < 4 {
            return None;
        }

        // theta is the normal angle: ~90 deg -> horizontal line,
        // ~0/180 deg -> vertical line
        let mut horizontal = Vec::new();
        let mut vertical = Vec::new();
        for l in &lines {
            let t = l.theta_deg;
            if t.abs_diff(90) <= HORIZONTAL_TOLERANCE {
                horizontal.push(*l);
            } else if t <= VERTICAL_TOLERANCE || t >= THETA_BINS - VERTICAL_TOLERANCE {
                vertical.push(*l);
            }
        }
        if horizontal.len() < 2 || vertical.len() < 2 {
            return None;
        }

        let cx = w as f32 * 0.5;
        let cy = h as f32 * 0.5;
        let top = *horizontal
            .iter()
            .min_by(|a, b| a.y_at(cx).total_cmp(&b.y_at(cx)))?;
        let bottom = *horizontal
            .iter()
            .max_by(|a, b| a.y_at(cx).total_cmp(&b.y_at(cx)))?;
        let left = *vertical
            .iter()
            .min_by(|a, b| a.x_at(cy).total_cmp(&b.x_at(cy)))?;
        let right = *vertical
            .iter()
            .max_by(|a, b| a.x_at(cy).total_cmp(&b.x_at(cy)))?;

        let quad = [
            intersect(&top, &left)?,
            intersect(&top, &right)?,
            intersect(&bottom, &right)?,
            intersect(&bottom, &left)?,
        ];
        accept_quad(Corners::ordered(quad), cfg, (w * h) as f32, self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optiform_core::NullSink;

    /// White page over a dark background, page occupying the given
    /// fractional extent of the frame.
    fn synthetic_scene(w: usize, h: usize, margin_frac: f32) -> RgbImage {
        let mut img = RgbImage::filled(w, h, [40, 45, 50]);
        let mx = (w as f32 * margin_frac) as usize;
        let my = (h as f32 * margin_frac) as usize;
        for y in my..h - my {
            for x in mx..w - mx {
                img.set(x, y, [235, 233, 230]);
            }
        }
        img
    }

    fn ctx_for<'a>(
        rgb: &'a RgbImage,
        gray: &'a GrayImage,
        blurred: &'a GrayImage,
    ) -> StrategyContext<'a> {
        StrategyContext { rgb, gray, blurred }
    }

    fn run(strategy: &dyn CornerStrategy, img: &RgbImage) -> Option<CornerHypothesis> {
        let gray = img.to_gray();
        let blurred = optiform_core::filter::gaussian_blur(&gray, 1.0);
        let cfg = NormalizeConfig::default();
        strategy.detect(&ctx_for(img, &gray, &blurred), &cfg, &mut NullSink)
    }

    #[test]
    fn segmentation_strategies_find_a_clean_page() {
        // portrait page, ~72% of a 320x400 frame, aspect ~1.4
        let img = synthetic_scene(320, 400, 0.08);
        for strategy in [
            &LightnessSegmentation as &dyn CornerStrategy,
            &BrightnessAdaptive,
            &SaturationValue,
            &ContrastEdges,
            &GradientMagnitude,
        ] {
            let hyp = run(strategy, &img)
                .unwrap_or_else(|| panic!("{} missed the page", strategy.name()));
            let c = hyp.corners;
            assert!((c.top_left().x - 25.6).abs() < 20.0, "{}", strategy.name());
            assert!((c.top_left().y - 32.0).abs() < 20.0, "{}", strategy.name());
            assert!(hyp.confidence > 0.5);
        }
    }

    #[test]
    fn small_paper_is_rejected_by_every_strategy() {
        // page covers ~10% of the frame, below the 15% gate
        let img = synthetic_scene(320, 400, 0.34);
        for strategy in default_strategies() {
            assert!(
                run(strategy.as_ref(), &img).is_none(),
                "{} accepted a too-small page",
                strategy.name()
            );
        }
    }

    #[test]
    fn line_reconstruction_recovers_an_axis_aligned_page() {
        let img = synthetic_scene(320, 400, 0.08);
        let hyp = run(&LineReconstruction, &img).expect("lines found");
        let c = hyp.corners;
        assert!((c.top_left().x - 25.6).abs() < 8.0);
        assert!((c.bottom_right().y - 368.0).abs() < 8.0);
    }

    #[test]
    fn hough_finds_a_single_straight_line() {
        let mut edges = GrayImage::new(100, 100);
        for x in 0..100 {
            edges.set(x, 40, 255);
        }
        let lines = hough_lines(&edges, 60, 8);
        assert!(!lines.is_empty());
        let l = lines[0];
        assert_eq!(l.theta_deg, 90);
        assert!((l.rho - 40.0).abs() <= 1.0);
    }
}
