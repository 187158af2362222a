//! Post-warp enhancement: per-channel light denoise and unsharp masking,
//! plus bicubic resizing for the no-geometry fallback path.
//!
//! Strength is deliberately low: the sharpening must not deform the
//! circular bubbles the mark detector votes on, and colour is preserved
//! because region auto-detection may still use it.

use optiform_core::filter::gaussian_blur;
use optiform_core::{sample_bicubic_u8, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EnhanceConfig {
    /// Denoise blur sigma applied before sharpening.
    pub denoise_sigma: f32,
    /// Sigma of the low-pass used by the unsharp mask.
    pub sharpen_sigma: f32,
    /// Unsharp amount: output = (1 + a) * denoised - a * low.
    pub sharpen_amount: f32,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            denoise_sigma: 0.7,
            sharpen_sigma: 1.5,
            sharpen_amount: 0.3,
        }
    }
}

fn enhance_plane(plane: &GrayImage, cfg: &EnhanceConfig) -> GrayImage {
    let denoised = gaussian_blur(plane, cfg.denoise_sigma);
    let low = gaussian_blur(&denoised, cfg.sharpen_sigma);
    let mut out = GrayImage::new(plane.width, plane.height);
    let a = cfg.sharpen_amount;
    for i in 0..out.data.len() {
        let v = (1.0 + a) * denoised.data[i] as f32 - a * low.data[i] as f32;
        out.data[i] = v.round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Per-channel denoise + mild sharpen, colour preserved.
pub fn enhance_rgb(img: &RgbImage, cfg: &EnhanceConfig) -> RgbImage {
    let planes = img.split_channels();
    let enhanced = [
        enhance_plane(&planes[0], cfg),
        enhance_plane(&planes[1], cfg),
        enhance_plane(&planes[2], cfg),
    ];
    RgbImage::merge_channels(&enhanced)
}

/// Bicubic resize to exact target dimensions.
pub fn resize_bicubic(img: &RgbImage, out_w: usize, out_h: usize) -> RgbImage {
    let planes = img.split_channels();
    let mut out_planes = [
        GrayImage::new(out_w, out_h),
        GrayImage::new(out_w, out_h),
        GrayImage::new(out_w, out_h),
    ];
    let sx = img.width as f32 / out_w.max(1) as f32;
    let sy = img.height as f32 / out_h.max(1) as f32;
    for (plane, out_plane) in planes.iter().zip(out_planes.iter_mut()) {
        let view = plane.view();
        for y in 0..out_h {
            let src_y = (y as f32 + 0.5) * sy - 0.5;
            for x in 0..out_w {
                let src_x = (x as f32 + 0.5) * sx - 0.5;
                out_plane.data[y * out_w + x] = sample_bicubic_u8(&view, src_x, src_y);
            }
        }
    }
    RgbImage::merge_channels(&out_planes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enhancement_keeps_flat_areas_flat() {
        let img = RgbImage::filled(16, 16, [200, 180, 160]);
        let out = enhance_rgb(&img, &EnhanceConfig::default());
        assert_eq!(out.get(8, 8), [200, 180, 160]);
    }

    #[test]
    fn enhancement_does_not_swap_channels() {
        let mut img = RgbImage::filled(16, 16, [255, 255, 255]);
        for y in 4..12 {
            for x in 4..12 {
                img.set(x, y, [200, 40, 40]); // reddish block
            }
        }
        let out = enhance_rgb(&img, &EnhanceConfig::default());
        let px = out.get(8, 8);
        assert!(px[0] > px[1] && px[0] > px[2]);
    }

    #[test]
    fn resize_hits_exact_dimensions() {
        let img = RgbImage::filled(37, 53, [10, 20, 30]);
        let out = resize_bicubic(&img, 160, 226);
        assert_eq!((out.width, out.height), (160, 226));
        assert_eq!(out.get(80, 113), [10, 20, 30]);
    }
}
