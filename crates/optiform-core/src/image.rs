//! Lightweight raster buffers.
//!
//! Pipeline stages borrow views and return new owned buffers; nothing here
//! aliases caller data. Pixels outside the image read as 0.

#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width * height],
        }
    }

    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: u8) {
        self.data[y * self.width + x] = v;
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Crop a rectangle, clamped to the image bounds. Out-of-range requests
    /// yield an empty image rather than panicking.
    pub fn crop(&self, x: usize, y: usize, w: usize, h: usize) -> GrayImage {
        let x1 = x.min(self.width);
        let y1 = y.min(self.height);
        let x2 = (x + w).min(self.width);
        let y2 = (y + h).min(self.height);
        let (cw, ch) = (x2 - x1, y2 - y1);
        let mut out = GrayImage::new(cw, ch);
        for row in 0..ch {
            let src = (y1 + row) * self.width + x1;
            let dst = row * cw;
            out.data[dst..dst + cw].copy_from_slice(&self.data[src..src + cw]);
        }
        out
    }
}

/// Interleaved 8-bit RGB buffer.
#[derive(Clone, Debug)]
pub struct RgbImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>, // row-major, len = w*h*3
}

impl RgbImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width * height * 3],
        }
    }

    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        let i = (y * self.width + x) * 3;
        self.data[i..i + 3].copy_from_slice(&rgb);
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Rec.601 luma.
    pub fn to_gray(&self) -> GrayImage {
        let mut out = GrayImage::new(self.width, self.height);
        for (dst, px) in out.data.iter_mut().zip(self.data.chunks_exact(3)) {
            let y = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
            *dst = y.round().clamp(0.0, 255.0) as u8;
        }
        out
    }

    /// Split into R, G, B planes. Downstream enhancement runs per channel
    /// so colour information survives for region detection.
    pub fn split_channels(&self) -> [GrayImage; 3] {
        let mut planes = [
            GrayImage::new(self.width, self.height),
            GrayImage::new(self.width, self.height),
            GrayImage::new(self.width, self.height),
        ];
        for (i, px) in self.data.chunks_exact(3).enumerate() {
            planes[0].data[i] = px[0];
            planes[1].data[i] = px[1];
            planes[2].data[i] = px[2];
        }
        planes
    }

    /// Inverse of [`RgbImage::split_channels`]. Planes must share dimensions.
    pub fn merge_channels(planes: &[GrayImage; 3]) -> RgbImage {
        let (w, h) = (planes[0].width, planes[0].height);
        debug_assert!(planes.iter().all(|p| p.width == w && p.height == h));
        let mut out = RgbImage::new(w, h);
        for i in 0..w * h {
            out.data[i * 3] = planes[0].data[i];
            out.data[i * 3 + 1] = planes[1].data[i];
            out.data[i * 3 + 2] = planes[2].data[i];
        }
        out
    }

    pub fn crop(&self, x: usize, y: usize, w: usize, h: usize) -> RgbImage {
        let x1 = x.min(self.width);
        let y1 = y.min(self.height);
        let x2 = (x + w).min(self.width);
        let y2 = (y + h).min(self.height);
        let (cw, ch) = (x2 - x1, y2 - y1);
        let mut out = RgbImage::new(cw, ch);
        for row in 0..ch {
            let src = ((y1 + row) * self.width + x1) * 3;
            let dst = row * cw * 3;
            out.data[dst..dst + cw * 3].copy_from_slice(&self.data[src..src + cw * 3]);
        }
        out
    }

    /// Rotate 90 degrees counter-clockwise (landscape -> portrait).
    pub fn rotate90_ccw(&self) -> RgbImage {
        let mut out = RgbImage::new(self.height, self.width);
        for y in 0..self.height {
            for x in 0..self.width {
                out.set(y, self.width - 1 - x, self.get(x, y));
            }
        }
        out
    }
}

#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray(src, x0, y0) as f32;
    let p10 = get_gray(src, x0 + 1, y0) as f32;
    let p01 = get_gray(src, x0, y0 + 1) as f32;
    let p11 = get_gray(src, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[inline]
pub fn sample_bilinear_u8(src: &GrayImageView<'_>, x: f32, y: f32) -> u8 {
    sample_bilinear(src, x, y).clamp(0.0, 255.0) as u8
}

/// Catmull-Rom weight (bicubic, a = -0.5).
#[inline]
fn cubic_weight(t: f32) -> f32 {
    const A: f32 = -0.5;
    let t = t.abs();
    if t <= 1.0 {
        ((A + 2.0) * t - (A + 3.0)) * t * t + 1.0
    } else if t < 2.0 {
        ((A * t - 5.0 * A) * t + 8.0 * A) * t - 4.0 * A
    } else {
        0.0
    }
}

/// Bicubic (Catmull-Rom) sample over the 4x4 neighbourhood. Border pixels
/// clamp to the image edge so the kernel never rings against the zero pad.
pub fn sample_bicubic(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    if src.width == 0 || src.height == 0 {
        return 0.0;
    }
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let mut acc = 0.0f32;
    let mut wsum = 0.0f32;
    for n in -1..=2i32 {
        let wy = cubic_weight(n as f32 - fy);
        if wy == 0.0 {
            continue;
        }
        let sy = (y0 + n).clamp(0, src.height as i32 - 1);
        for m in -1..=2i32 {
            let wx = cubic_weight(m as f32 - fx);
            if wx == 0.0 {
                continue;
            }
            let sx = (x0 + m).clamp(0, src.width as i32 - 1);
            let w = wx * wy;
            acc += w * src.data[sy as usize * src.width + sx as usize] as f32;
            wsum += w;
        }
    }
    if wsum.abs() < 1e-6 {
        return 0.0;
    }
    acc / wsum
}

#[inline]
pub fn sample_bicubic_u8(src: &GrayImageView<'_>, x: f32, y: f32) -> u8 {
    sample_bicubic(src, x, y).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_crop_clamps_to_bounds() {
        let mut img = GrayImage::new(4, 4);
        img.set(3, 3, 200);
        let c = img.crop(2, 2, 10, 10);
        assert_eq!((c.width, c.height), (2, 2));
        assert_eq!(c.get(1, 1), 200);

        let empty = img.crop(8, 8, 2, 2);
        assert!(empty.is_empty());
    }

    #[test]
    fn channel_split_round_trips() {
        let mut img = RgbImage::new(3, 2);
        img.set(1, 1, [10, 20, 30]);
        img.set(2, 0, [7, 8, 9]);
        let merged = RgbImage::merge_channels(&img.split_channels());
        assert_eq!(merged.data, img.data);
    }

    #[test]
    fn rotate90_maps_corners() {
        let mut img = RgbImage::new(3, 2);
        img.set(2, 0, [255, 0, 0]); // top-right
        let rot = img.rotate90_ccw();
        assert_eq!((rot.width, rot.height), (2, 3));
        // top-right travels to top-left under a CCW rotation
        assert_eq!(rot.get(0, 0), [255, 0, 0]);
    }

    #[test]
    fn bicubic_is_exact_on_constant_images() {
        let img = GrayImage::filled(8, 8, 77);
        let v = sample_bicubic(&img.view(), 3.4, 2.7);
        assert!((v - 77.0).abs() < 1e-3);
    }

    #[test]
    fn bicubic_interpolates_at_integer_sites() {
        let mut img = GrayImage::filled(8, 8, 50);
        img.set(4, 4, 150);
        let v = sample_bicubic(&img.view(), 4.0, 4.0);
        assert!((v - 150.0).abs() < 1e-3);
    }
}
