//! The end-to-end pipeline: normalize, locate, classify, assemble.

use std::collections::BTreeMap;

use serde::Serialize;

use optiform_core::{DebugSink, Mark, NullSink, RgbImage};
use optiform_detect::{
    IdentityReader, MarkDetectConfig, MarkDetector, RegionConfig, RegionLocator,
};
use optiform_normalize::{NormalizeConfig, PageNormalizer};
use optiform_score::{score, AnswerKey, ScoreReport};
use optiform_template::FormTemplate;

/// Errors surfaced by the pipeline. Everything downstream of a readable
/// image degrades to blank sections instead of erroring.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("failed to load image: {0}")]
    ImageLoad(String),
}

/// Decode an image file into the pipeline's interleaved RGB buffer.
#[cfg(feature = "image")]
pub fn load_rgb_image(path: impl AsRef<std::path::Path>) -> Result<RgbImage, PipelineError> {
    let decoded = image::open(path.as_ref())
        .map_err(|e| PipelineError::ImageLoad(e.to_string()))?
        .to_rgb8();
    Ok(RgbImage {
        width: decoded.width() as usize,
        height: decoded.height() as usize,
        data: decoded.into_raw(),
    })
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct StudentIdentity {
    pub name: String,
    pub surname: String,
}

/// Structured pipeline output; serializes to the wire contract
/// (`answers` and `sections` values are letters or `"blank"`).
#[derive(Clone, Debug, Serialize)]
pub struct FormReadResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub identity: StudentIdentity,
    /// Global question number -> mark, subjects concatenated in template
    /// order.
    pub answers: BTreeMap<u32, Mark>,
    /// Per-section maps under the same global numbering.
    pub sections: BTreeMap<String, BTreeMap<u32, Mark>>,
}

impl FormReadResult {
    /// Grade this result against an answer key.
    pub fn score_against(&self, key: &AnswerKey) -> ScoreReport {
        score(key, &self.answers)
    }
}

/// Per-stage configuration bundle.
#[derive(Clone, Debug)]
pub struct FormReaderConfig {
    pub normalize: NormalizeConfig,
    pub regions: RegionConfig,
    pub marks: MarkDetectConfig,
    pub identity: MarkDetectConfig,
}

impl Default for FormReaderConfig {
    fn default() -> Self {
        Self {
            normalize: NormalizeConfig::default(),
            regions: RegionConfig::default(),
            marks: MarkDetectConfig::default(),
            identity: MarkDetectConfig::identity(),
        }
    }
}

impl FormReaderConfig {
    /// Defaults with the canonical size and aspect window taken from the
    /// template rather than pipeline constants.
    pub fn for_template(template: &FormTemplate) -> Self {
        Self {
            normalize: NormalizeConfig {
                canonical_width: template.canonical_size.width,
                canonical_height: template.canonical_size.height,
                aspect_min: template.aspect_window.min,
                aspect_max: template.aspect_window.max,
                ..NormalizeConfig::default()
            },
            regions: RegionConfig::default(),
            marks: MarkDetectConfig::default(),
            identity: MarkDetectConfig::identity(),
        }
    }
}

/// One fully wired reading pipeline for a single form template. Carries no
/// state between invocations; independent readers may run on separate
/// threads without locking.
pub struct FormReader {
    template: FormTemplate,
    normalizer: PageNormalizer,
    locator: RegionLocator,
    marks: MarkDetector,
    identity: IdentityReader,
}

impl FormReader {
    pub fn new(template: FormTemplate, cfg: FormReaderConfig) -> Self {
        Self {
            template,
            normalizer: PageNormalizer::new(cfg.normalize),
            locator: RegionLocator::new(cfg.regions),
            marks: MarkDetector::new(cfg.marks),
            identity: IdentityReader::new(cfg.identity),
        }
    }

    pub fn template(&self) -> &FormTemplate {
        &self.template
    }

    /// Load an image from disk and read it. The only fatal failure of the
    /// pipeline is an unreadable file.
    #[cfg(feature = "image")]
    pub fn read_path(&self, path: impl AsRef<std::path::Path>) -> Result<FormReadResult, PipelineError> {
        let rgb = load_rgb_image(path)?;
        Ok(self.read_image(&rgb))
    }

    pub fn read_image(&self, image: &RgbImage) -> FormReadResult {
        self.read_image_with(image, &mut NullSink)
    }

    /// Run the full pipeline on an in-memory image. Infallible: degraded
    /// inputs produce blank sections, never an error.
    pub fn read_image_with(&self, image: &RgbImage, sink: &mut dyn DebugSink) -> FormReadResult {
        let page = self.normalizer.normalize_with(image, sink);
        let regions = self.locator.locate_with(&page.image, &self.template, sink);

        // identity grids, template order: name first, surname second
        let mut identity = StudentIdentity::default();
        for (i, section) in self.template.identity_sections.iter().enumerate() {
            let text = regions
                .get(&section.id)
                .map(|r| {
                    self.identity.read_with(
                        &r.image.to_gray(),
                        section.columns,
                        &section.alphabet,
                        sink,
                    )
                })
                .unwrap_or_default();
            log::info!("identity '{}' read as '{}'", section.id, text);
            match i {
                0 => identity.name = text,
                1 => identity.surname = text,
                _ => {}
            }
        }

        // answer columns, renumbered to the template's global ranges
        let mut answers = BTreeMap::new();
        let mut sections = BTreeMap::new();
        for section in &self.template.answer_sections {
            let rows = section.question_count();
            let local = match regions.get(&section.id) {
                Some(r) if !r.is_empty() => {
                    self.marks
                        .read_section_with(&r.image.to_gray(), rows, &section.choices, sink)
                }
                _ => (1..=rows).map(|q| (q, Mark::Blank)).collect(),
            };

            let mut global = BTreeMap::new();
            for (local_q, mark) in local {
                let q = section.start_question + local_q as u32 - 1;
                global.insert(q, mark);
                answers.insert(q, mark);
            }
            let marked = global.values().filter(|m| !m.is_blank()).count();
            log::info!("section '{}': {marked}/{rows} marked", section.id);
            sections.insert(section.id.clone(), global);
        }

        FormReadResult {
            success: true,
            error: None,
            identity,
            answers,
            sections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optiform_template::get_template;

    #[test]
    fn result_serializes_to_the_wire_shape() {
        let result = FormReadResult {
            success: true,
            error: None,
            identity: StudentIdentity {
                name: "AYŞE".into(),
                surname: "KAYA".into(),
            },
            answers: [(1, Mark::Letter('A')), (2, Mark::Blank)].into(),
            sections: [(
                "turkce".to_string(),
                BTreeMap::from([(1, Mark::Letter('A')), (2, Mark::Blank)]),
            )]
            .into(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["identity"]["name"], "AYŞE");
        assert_eq!(json["answers"]["1"], "A");
        assert_eq!(json["answers"]["2"], "blank");
        assert_eq!(json["sections"]["turkce"]["2"], "blank");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn config_takes_canonical_geometry_from_the_template() {
        let template = get_template("ygs").unwrap();
        let cfg = FormReaderConfig::for_template(template);
        assert_eq!(cfg.normalize.canonical_width, 1600);
        assert_eq!(cfg.normalize.canonical_height, 2264);
        assert_eq!(cfg.normalize.aspect_min, 1.2);
        assert_eq!(cfg.normalize.aspect_max, 1.8);
    }
}
