//! Layout-aware region extraction and mark classification.
//!
//! [`RegionLocator`] resolves every template section to a sub-image of the
//! canonical page (auto-detected boxes with a fractional fallback).
//! [`MarkDetector`] classifies each grid row of an answer column as a
//! chosen letter or blank via a circular Hough transform and multi-signal
//! voting; [`IdentityReader`] runs the same machinery column-wise over a
//! letter grid and assembles name strings.

mod hough;
mod identity;
mod marks;
mod region;

pub use hough::{hough_circles, Circle, HoughCircleConfig};
pub use identity::IdentityReader;
pub use marks::{MarkCandidate, MarkDetectConfig, MarkDetector};
pub use region::{Region, RegionConfig, RegionLocator, SectionBoxRules};
