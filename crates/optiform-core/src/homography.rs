//! 4-point homography estimation and perspective warping.

use crate::{sample_bicubic_u8, GrayImage, GrayImageView, RgbImage};
use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let v = self.h * Vector3::new(p.x as f64, p.y as f64, 1.0);
        let w = v[2];
        Point2::new((v[0] / w) as f32, (v[1] / w) as f32)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }
}

fn similarity_to_unit(pts: &[Point2<f32>; 4]) -> ([Point2<f64>; 4], Matrix3<f64>) {
    // Hartley normalization: centroid at origin, mean distance sqrt(2).
    let mut cx = 0.0f64;
    let mut cy = 0.0f64;
    for p in pts {
        cx += p.x as f64;
        cy += p.y as f64;
    }
    cx /= 4.0;
    cy /= 4.0;

    let mut mean_dist = 0.0f64;
    for p in pts {
        let dx = p.x as f64 - cx;
        let dy = p.y as f64 - cy;
        mean_dist += (dx * dx + dy * dy).sqrt();
    }
    mean_dist /= 4.0;

    let s = if mean_dist > 1e-12 {
        (2.0f64).sqrt() / mean_dist
    } else {
        1.0
    };
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);

    let mut out = [Point2::new(0.0f64, 0.0); 4];
    for (i, p) in pts.iter().enumerate() {
        let v = t * Vector3::new(p.x as f64, p.y as f64, 1.0);
        out[i] = Point2::new(v[0], v[1]);
    }
    (out, t)
}

/// Compute H such that `dst ~ H * src` from 4 point correspondences in
/// consistent corner order. Returns `None` for degenerate quads.
pub fn fit_quad_homography(
    src: &[Point2<f32>; 4],
    dst: &[Point2<f32>; 4],
) -> Option<Homography> {
    // Unknowns [h11..h32] with h33 = 1; two rows per correspondence:
    //   h11 x + h12 y + h13 - u h31 x - u h32 y = u
    //   h21 x + h22 y + h23 - v h31 x - v h32 y = v
    let (src_n, t_src) = similarity_to_unit(src);
    let (dst_n, t_dst) = similarity_to_unit(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let (x, y) = (src_n[k].x, src_n[k].y);
        let (u, v) = (dst_n[k].x, dst_n[k].y);

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b)?;
    let hn = Matrix3::new(x[0], x[1], x[2], x[3], x[4], x[5], x[6], x[7], 1.0);

    // H = T_dst^{-1} * Hn * T_src, scaled so h33 = 1.
    let h = t_dst.try_inverse()? * hn * t_src;
    let s = h[(2, 2)];
    if s.abs() < 1e-12 {
        return None;
    }
    Some(Homography::new(h / s))
}

/// Warp into a canonical image: for each destination pixel, map back into
/// the source via `h_src_from_dst` and sample with the bicubic kernel.
pub fn warp_perspective_gray(
    src: &GrayImageView<'_>,
    h_src_from_dst: Homography,
    out_w: usize,
    out_h: usize,
) -> GrayImage {
    let mut out = GrayImage::new(out_w, out_h);
    for y in 0..out_h {
        for x in 0..out_w {
            // map destination pixel centres, then sample in index space
            let p = h_src_from_dst.apply(Point2::new(x as f32 + 0.5, y as f32 + 0.5));
            out.data[y * out_w + x] = sample_bicubic_u8(src, p.x - 0.5, p.y - 0.5);
        }
    }
    out
}

/// Colour warp: each channel plane is sampled independently so the hue of
/// pen marks survives for downstream region detection.
pub fn warp_perspective_rgb(
    src: &RgbImage,
    h_src_from_dst: Homography,
    out_w: usize,
    out_h: usize,
) -> RgbImage {
    let planes = src.split_channels();
    let warped = [
        warp_perspective_gray(&planes[0].view(), h_src_from_dst, out_w, out_h),
        warp_perspective_gray(&planes[1].view(), h_src_from_dst, out_w, out_h),
        warp_perspective_gray(&planes[2].view(), h_src_from_dst, out_w, out_h),
    ];
    RgbImage::merge_channels(&warped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Point2<f32>, b: Point2<f32>, tol: f32) {
        assert!(
            (a.x - b.x).abs() < tol && (a.y - b.y).abs() < tol,
            "expected ({:.4},{:.4}) ~ ({:.4},{:.4})",
            a.x,
            a.y,
            b.x,
            b.y
        );
    }

    #[test]
    fn recovers_a_known_projective_map() {
        let ground_truth = Homography::new(Matrix3::new(
            0.8, 0.05, 120.0, //
            -0.02, 1.1, 80.0, //
            0.0009, -0.0004, 1.0,
        ));

        let rect = [
            Point2::new(0.0f32, 0.0),
            Point2::new(180.0f32, 0.0),
            Point2::new(180.0f32, 260.0),
            Point2::new(0.0f32, 260.0),
        ];
        let img = rect.map(|p| ground_truth.apply(p));

        let fitted = fit_quad_homography(&rect, &img).expect("well-posed quad");
        for p in [
            Point2::new(0.0f32, 0.0),
            Point2::new(60.0, 40.0),
            Point2::new(150.0, 220.0),
        ] {
            assert_close(fitted.apply(p), ground_truth.apply(p), 1e-3);
        }
    }

    #[test]
    fn inverse_round_trips_points() {
        let h = Homography::new(Matrix3::new(
            1.2, 0.1, 5.0, //
            -0.05, 0.9, 3.0, //
            0.001, 0.0005, 1.0,
        ));
        let inv = h.inverse().expect("invertible");
        for p in [Point2::new(0.0f32, 0.0), Point2::new(320.0f32, 200.0)] {
            assert_close(inv.apply(h.apply(p)), p, 1e-3);
        }
    }

    #[test]
    fn degenerate_quad_is_rejected() {
        // all four correspondences collapsed onto one point
        let src = [Point2::new(5.0f32, 7.0); 4];
        let dst = [Point2::new(2.0f32, 3.0); 4];
        assert!(fit_quad_homography(&src, &dst).is_none());
    }

    #[test]
    fn identity_warp_preserves_pixels() {
        let mut src = GrayImage::filled(20, 20, 200);
        src.set(10, 5, 30);
        let h = Homography::new(Matrix3::identity());
        let out = warp_perspective_gray(&src.view(), h, 20, 20);
        assert_eq!(out.get(10, 5), 30);
        assert_eq!(out.get(3, 3), 200);
    }
}
