//! Core types and utilities for optical form reading.
//!
//! This crate is intentionally small: raster buffers, sampling, corner
//! ordering, the 4-point homography and the shared `Mark` vocabulary. It
//! does *not* depend on any concrete detector or on image codecs.

pub mod binary;
mod corners;
mod debug;
pub mod filter;
mod homography;
mod image;
mod logger;
mod mark;

pub use corners::{order_points, Corners};
pub use debug::{DebugSink, NullSink};
pub use homography::{fit_quad_homography, warp_perspective_gray, warp_perspective_rgb, Homography};
pub use image::{
    sample_bicubic, sample_bicubic_u8, sample_bilinear, sample_bilinear_u8, GrayImage,
    GrayImageView, RgbImage,
};
pub use logger::init_with_level;
pub use mark::Mark;
