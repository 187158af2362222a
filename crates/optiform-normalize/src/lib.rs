//! Geometric normalization of photographed answer sheets.
//!
//! A [`PageNormalizer`] tries a prioritized chain of page-boundary
//! strategies (mask segmentation, edge maps, line reconstruction) and
//! perspective-warps the first accepted quadrilateral to the canonical
//! portrait size. It never fails: when no strategy produces an acceptable
//! quad the input is plainly resized instead, so downstream stages always
//! receive a canonical image.

mod enhance;
mod normalizer;
mod quad;
mod strategy;

pub use enhance::{enhance_rgb, resize_bicubic, EnhanceConfig};
pub use normalizer::{NormalizeConfig, NormalizedPage, PageNormalizer};
pub use quad::{approx_polygon, convex_hull, min_area_rect, quad_from_mask};
pub use strategy::{
    default_strategies, BrightnessAdaptive, ContrastEdges, CornerHypothesis, CornerStrategy,
    GradientMagnitude, LightnessSegmentation, LineReconstruction, SaturationValue,
    StrategyContext,
};
