//! High-level facade crate for the `optiform-*` workspace.
//!
//! This crate provides:
//! - stable re-exports of the underlying pipeline crates
//! - the end-to-end [`FormReader`] that turns a photographed answer sheet
//!   into identity strings, an answer map and (optionally) a score report
//!
//! ## Quickstart
//!
//! ```no_run
//! use optiform::{FormReader, FormReaderConfig};
//! use optiform::template::get_template;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let template = get_template("ygs")?;
//! let reader = FormReader::new(template.clone(), FormReaderConfig::for_template(template));
//! let result = reader.read_path("sheet.jpg")?;
//! println!("{} answers, student {}", result.answers.len(), result.identity.name);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - [`core`]: raster buffers, corner ordering, homographies, `Mark`.
//! - [`template`]: declarative form layouts and the registry.
//! - [`normalize`]: the page normalizer and its strategy chain.
//! - [`detect`]: region location, circular Hough transform, mark voting.
//! - [`scoring`]: answer keys and score reports.

pub use optiform_core as core;
pub use optiform_detect as detect;
pub use optiform_normalize as normalize;
pub use optiform_score as scoring;
pub use optiform_template as template;

pub use optiform_core::{DebugSink, Mark, NullSink};
pub use optiform_score::{AnswerKey, ScoreReport};
pub use optiform_template::FormTemplate;

mod pipeline;

pub use pipeline::{FormReadResult, FormReader, FormReaderConfig, PipelineError, StudentIdentity};

#[cfg(feature = "image")]
pub use pipeline::load_rgb_image;
