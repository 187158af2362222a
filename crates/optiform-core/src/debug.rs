//! Stage observer for diagnostic image dumps.
//!
//! Pipeline stages report intermediate rasters through a [`DebugSink`]
//! instead of writing files themselves; production wiring passes
//! [`NullSink`] so the hot path performs no I/O.

use crate::GrayImage;

/// Receives `(stage, image)` pairs as the pipeline runs. Stage names are
/// stable slugs such as `"normalize/paper-mask"` or
/// `"detect/turkce-circles"`.
pub trait DebugSink {
    fn record(&mut self, stage: &str, image: &GrayImage);
}

/// Discards everything. The default sink.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DebugSink for NullSink {
    fn record(&mut self, _stage: &str, _image: &GrayImage) {}
}
