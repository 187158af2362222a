//! Built-in template registry.

use std::sync::OnceLock;

use serde::Serialize;

use crate::template::{
    AnswerSection, AspectWindow, CanonicalSize, FormTemplate, FracBox, IdentitySection,
};

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("unknown form template '{0}'")]
    UnknownTemplate(String),
}

/// Listing entry for the registry.
#[derive(Clone, Debug, Serialize)]
pub struct TemplateSummary {
    pub id: String,
    pub name: String,
    pub description: String,
}

const TURKISH_ALPHABET: &str = "ABCÇDEFGĞHIİJKLMNOÖPRSŞTUÜVYZ";

fn ygs_template() -> FormTemplate {
    let alphabet: Vec<char> = TURKISH_ALPHABET.chars().collect();
    let choices = vec!['A', 'B', 'C', 'D', 'E'];

    FormTemplate {
        id: "ygs".into(),
        name: "YGS".into(),
        description: "YGS answer sheet: name/surname grids, 4 subjects x 40 questions".into(),
        canonical_size: CanonicalSize {
            width: 1600,
            height: 2264,
        },
        aspect_window: AspectWindow { min: 1.2, max: 1.8 },
        identity_sections: vec![
            IdentitySection {
                id: "name".into(),
                label: "AD".into(),
                columns: 12,
                alphabet: alphabet.clone(),
                bounds: FracBox::new(0.080, 0.092, 0.30, 0.500),
            },
            IdentitySection {
                id: "surname".into(),
                label: "SOYAD".into(),
                columns: 12,
                alphabet,
                bounds: FracBox::new(0.080, 0.530, 0.30, 0.94),
            },
        ],
        answer_sections: vec![
            AnswerSection {
                id: "turkce".into(),
                label: "Türkçe".into(),
                start_question: 1,
                end_question: 40,
                choices: choices.clone(),
                bounds: FracBox::new(0.315, 0.385, 0.42, 0.94),
            },
            AnswerSection {
                id: "matematik".into(),
                label: "T. Matematik".into(),
                start_question: 41,
                end_question: 80,
                choices: choices.clone(),
                bounds: FracBox::new(0.45, 0.385, 0.585, 0.94),
            },
            AnswerSection {
                id: "fen".into(),
                label: "Fen Bilimleri".into(),
                start_question: 81,
                end_question: 120,
                choices: choices.clone(),
                bounds: FracBox::new(0.595, 0.385, 0.745, 0.94),
            },
            AnswerSection {
                id: "sosyal".into(),
                label: "Sosyal Bilimler".into(),
                start_question: 121,
                end_question: 160,
                choices,
                bounds: FracBox::new(0.74, 0.385, 0.89, 0.94),
            },
        ],
    }
}

fn registry() -> &'static [FormTemplate] {
    static REGISTRY: OnceLock<Vec<FormTemplate>> = OnceLock::new();
    REGISTRY.get_or_init(|| vec![ygs_template()])
}

/// Look up a built-in template by id.
pub fn get_template(id: &str) -> Result<&'static FormTemplate, TemplateError> {
    registry()
        .iter()
        .find(|t| t.id == id)
        .ok_or_else(|| TemplateError::UnknownTemplate(id.to_string()))
}

/// Summaries of every registered template.
pub fn list_templates() -> Vec<TemplateSummary> {
    registry()
        .iter()
        .map(|t| TemplateSummary {
            id: t.id.clone(),
            name: t.name.clone(),
            description: t.description.clone(),
        })
        .collect()
}
