//! The page normalizer: strategy chain, perspective warp, enhancement,
//! resize fallback.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use optiform_core::filter::gaussian_blur;
use optiform_core::{
    fit_quad_homography, warp_perspective_rgb, Corners, DebugSink, NullSink, RgbImage,
};

use crate::enhance::{enhance_rgb, resize_bicubic, EnhanceConfig};
use crate::strategy::{default_strategies, CornerStrategy, StrategyContext};

/// Tunables for page-boundary detection and normalization. Defaults are
/// calibrated for the YGS form family photographed at phone resolutions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Canonical output width in pixels.
    pub canonical_width: usize,
    /// Canonical output height in pixels (portrait: height > width).
    pub canonical_height: usize,
    /// Minimum page area as a fraction of the frame.
    pub min_area_frac: f32,
    /// Accepted long/short aspect range for the page quad (A4 is ~1.414).
    pub aspect_min: f32,
    pub aspect_max: f32,
    /// Pre-smoothing sigma applied once before every strategy runs.
    pub presmooth_sigma: f32,
    /// Strategy 2: global brightness cut.
    pub brightness_threshold: u8,
    /// Strategy 2: adaptive window side (odd) and mean offset.
    pub adaptive_block: usize,
    pub adaptive_c: i16,
    /// Paper-mask morphology: kernel side and close/open iteration counts.
    pub paper_close_kernel: usize,
    pub paper_close_iters: usize,
    pub paper_open_iters: usize,
    /// Strategy 1: minimum luma and maximum channel spread for "paper".
    pub lightness_min: u8,
    pub neutral_chroma_max: u8,
    /// Strategy 3: HSV-style gates.
    pub saturation_max: u8,
    pub value_min: u8,
    /// Strategy 4: escalating Sobel magnitude thresholds.
    pub edge_thresholds: Vec<f32>,
    pub edge_close_kernel: usize,
    /// Strategies 5 and 6: gradient magnitude cut.
    pub gradient_threshold: f32,
    /// Polygon approximation epsilon as a fraction of the hull perimeter.
    pub approx_epsilon_frac: f32,
    /// Strategy 6: Hough vote floor as a fraction of min(width, height),
    /// and the peak cap.
    pub line_vote_frac: f32,
    pub max_lines: usize,
    pub enhance: EnhanceConfig,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            canonical_width: 1600,
            canonical_height: 2264,
            min_area_frac: 0.15,
            aspect_min: 1.2,
            aspect_max: 1.8,
            presmooth_sigma: 1.0,
            brightness_threshold: 150,
            adaptive_block: 11,
            adaptive_c: 2,
            paper_close_kernel: 15,
            paper_close_iters: 3,
            paper_open_iters: 2,
            lightness_min: 140,
            neutral_chroma_max: 40,
            saturation_max: 60,
            value_min: 140,
            edge_thresholds: vec![100.0, 160.0, 260.0],
            edge_close_kernel: 5,
            gradient_threshold: 60.0,
            approx_epsilon_frac: 0.02,
            line_vote_frac: 0.35,
            max_lines: 32,
            enhance: EnhanceConfig::default(),
        }
    }
}

/// Output of normalization. `corners`/`strategy` are `None` on the resize
/// fallback path.
#[derive(Debug)]
pub struct NormalizedPage {
    pub image: RgbImage,
    pub corners: Option<Corners>,
    pub strategy: Option<&'static str>,
}

pub struct PageNormalizer {
    cfg: NormalizeConfig,
    strategies: Vec<Box<dyn CornerStrategy>>,
}

impl PageNormalizer {
    pub fn new(cfg: NormalizeConfig) -> Self {
        Self {
            cfg,
            strategies: default_strategies(),
        }
    }

    /// Replace the strategy chain, e.g. to test a single strategy or to
    /// prepend a template-specific one.
    pub fn with_strategies(cfg: NormalizeConfig, strategies: Vec<Box<dyn CornerStrategy>>) -> Self {
        Self { cfg, strategies }
    }

    pub fn config(&self) -> &NormalizeConfig {
        &self.cfg
    }

    pub fn normalize(&self, image: &RgbImage) -> NormalizedPage {
        self.normalize_with(image, &mut NullSink)
    }

    /// Run the strategy chain and warp the first accepted quad. Always
    /// returns an image of the canonical size; this path never errors.
    pub fn normalize_with(&self, image: &RgbImage, sink: &mut dyn DebugSink) -> NormalizedPage {
        let gray = image.to_gray();
        let blurred = gaussian_blur(&gray, self.cfg.presmooth_sigma);
        let ctx = StrategyContext {
            rgb: image,
            gray: &gray,
            blurred: &blurred,
        };

        for strategy in &self.strategies {
            let Some(hypothesis) = strategy.detect(&ctx, &self.cfg, sink) else {
                continue;
            };
            let corners = hypothesis.corners.into_portrait();
            let Some(warped) = self.warp(image, &corners) else {
                log::warn!(
                    "{}: degenerate quad, trying next strategy",
                    strategy.name()
                );
                continue;
            };
            log::info!(
                "page found via {} (confidence {:.2})",
                strategy.name(),
                hypothesis.confidence
            );
            return NormalizedPage {
                image: enhance_rgb(&self.ensure_portrait(warped), &self.cfg.enhance),
                corners: Some(corners),
                strategy: Some(strategy.name()),
            };
        }

        log::warn!("no page boundary found, resizing whole frame");
        let resized = resize_bicubic(image, self.cfg.canonical_width, self.cfg.canonical_height);
        NormalizedPage {
            image: enhance_rgb(&self.ensure_portrait(resized), &self.cfg.enhance),
            corners: None,
            strategy: None,
        }
    }

    fn warp(&self, image: &RgbImage, corners: &Corners) -> Option<RgbImage> {
        let (w, h) = (
            self.cfg.canonical_width as f32,
            self.cfg.canonical_height as f32,
        );
        let canonical = [
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(w, h),
            Point2::new(0.0, h),
        ];
        let h_src_from_dst = fit_quad_homography(&canonical, &corners.points)?;
        Some(warp_perspective_rgb(
            image,
            h_src_from_dst,
            self.cfg.canonical_width,
            self.cfg.canonical_height,
        ))
    }

    fn ensure_portrait(&self, image: RgbImage) -> RgbImage {
        if image.width > image.height {
            log::info!("landscape output, rotating 90 degrees");
            image.rotate90_ccw()
        } else {
            image
        }
    }
}
