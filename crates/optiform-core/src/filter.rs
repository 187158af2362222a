//! Separable Gaussian smoothing and Sobel gradients.

use crate::GrayImage;

/// Separable Gaussian blur. `sigma <= 0` returns a copy.
pub fn gaussian_blur(gray: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 || gray.is_empty() {
        return gray.clone();
    }
    let radius = (3.0 * sigma).ceil() as i32;
    let mut kernel = Vec::with_capacity((2 * radius + 1) as usize);
    let denom = 2.0 * sigma * sigma;
    let mut sum = 0.0f32;
    for i in -radius..=radius {
        let w = (-((i * i) as f32) / denom).exp();
        kernel.push(w);
        sum += w;
    }
    for w in kernel.iter_mut() {
        *w /= sum;
    }

    let (w, h) = (gray.width, gray.height);
    let clamp_x = |x: i32| x.clamp(0, w as i32 - 1) as usize;
    let clamp_y = |y: i32| y.clamp(0, h as i32 - 1) as usize;

    // horizontal pass into f32, vertical pass back to u8
    let mut tmp = vec![0.0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (k, wt) in kernel.iter().enumerate() {
                let sx = clamp_x(x as i32 + k as i32 - radius);
                acc += wt * gray.data[y * w + sx] as f32;
            }
            tmp[y * w + x] = acc;
        }
    }
    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (k, wt) in kernel.iter().enumerate() {
                let sy = clamp_y(y as i32 + k as i32 - radius);
                acc += wt * tmp[sy * w + x];
            }
            out.data[y * w + x] = acc.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Per-pixel Sobel responses.
pub struct GradientField {
    pub width: usize,
    pub height: usize,
    pub gx: Vec<f32>,
    pub gy: Vec<f32>,
}

impl GradientField {
    #[inline]
    pub fn magnitude(&self, x: usize, y: usize) -> f32 {
        let i = y * self.width + x;
        (self.gx[i] * self.gx[i] + self.gy[i] * self.gy[i]).sqrt()
    }
}

const SOBEL_GX: [[i32; 3]; 3] = [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]];
const SOBEL_GY: [[i32; 3]; 3] = [[-1, -2, -1], [0, 0, 0], [1, 2, 1]];

/// 3x3 Sobel over the interior; the one-pixel border stays zero.
pub fn sobel(gray: &GrayImage) -> GradientField {
    let (w, h) = (gray.width, gray.height);
    let mut field = GradientField {
        width: w,
        height: h,
        gx: vec![0.0; w * h],
        gy: vec![0.0; w * h],
    };
    if w < 3 || h < 3 {
        return field;
    }
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut gx = 0i32;
            let mut gy = 0i32;
            for ky in 0..3 {
                for kx in 0..3 {
                    let v = gray.data[(y + ky - 1) * w + (x + kx - 1)] as i32;
                    gx += v * SOBEL_GX[ky][kx];
                    gy += v * SOBEL_GY[ky][kx];
                }
            }
            field.gx[y * w + x] = gx as f32;
            field.gy[y * w + x] = gy as f32;
        }
    }
    field
}

/// Binary edge mask from thresholded gradient magnitude.
pub fn edge_mask(gradients: &GradientField, threshold: f32) -> GrayImage {
    let mut out = GrayImage::new(gradients.width, gradients.height);
    for y in 0..gradients.height {
        for x in 0..gradients.width {
            if gradients.magnitude(x, y) > threshold {
                out.data[y * gradients.width + x] = 255;
            }
        }
    }
    out
}
