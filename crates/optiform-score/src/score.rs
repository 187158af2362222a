//! Score computation and the per-question audit trail.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use optiform_core::Mark;

use crate::key::AnswerKey;

/// One graded question.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuestionAudit {
    pub subject: String,
    pub question_number: u32,
    pub detected: Mark,
    pub correct: char,
    pub is_correct: bool,
    pub points_earned: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SubjectScore {
    pub score: f64,
    pub correct: usize,
    pub wrong: usize,
    pub blank: usize,
    pub total: usize,
    /// Net statistic of the exam family: correct minus a quarter of the
    /// wrong answers.
    pub net: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoreReport {
    pub total_score: f64,
    pub correct_count: usize,
    pub wrong_count: usize,
    pub blank_count: usize,
    pub total_questions: usize,
    /// Correct percentage in [0, 100].
    pub success_rate: f64,
    pub net: f64,
    pub subject_scores: BTreeMap<String, SubjectScore>,
    pub details: Vec<QuestionAudit>,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Grade a flattened answer map against the key. Missing entries read as
/// blank; only an exact non-blank match earns the question's points. Short
/// or empty maps degrade to zero credit for the unmatched tail — never an
/// error.
pub fn score(key: &AnswerKey, answers: &BTreeMap<u32, Mark>) -> ScoreReport {
    let mut report = ScoreReport {
        total_score: 0.0,
        correct_count: 0,
        wrong_count: 0,
        blank_count: 0,
        total_questions: 0,
        success_rate: 0.0,
        net: 0.0,
        subject_scores: BTreeMap::new(),
        details: Vec::with_capacity(key.total_questions()),
    };

    let mut question = 1u32;
    for subject in &key.subjects {
        let mut subject_score = SubjectScore {
            total: subject.answers.len(),
            ..SubjectScore::default()
        };

        for (i, &correct) in subject.answers.iter().enumerate() {
            let detected = answers.get(&question).copied().unwrap_or(Mark::Blank);
            let is_correct = detected == Mark::Letter(correct);
            let points = subject.points.get(i).copied().unwrap_or(0.0);
            let points_earned = if is_correct { points } else { 0.0 };

            if is_correct {
                report.correct_count += 1;
                subject_score.correct += 1;
                subject_score.score += points_earned;
                report.total_score += points_earned;
            } else if detected.is_blank() {
                report.blank_count += 1;
                subject_score.blank += 1;
            } else {
                report.wrong_count += 1;
                subject_score.wrong += 1;
            }

            report.details.push(QuestionAudit {
                subject: subject.name.clone(),
                question_number: question,
                detected,
                correct,
                is_correct,
                points_earned,
            });

            question += 1;
            report.total_questions += 1;
        }

        subject_score.net =
            round2(subject_score.correct as f64 - subject_score.wrong as f64 / 4.0);
        subject_score.score = round2(subject_score.score);
        report
            .subject_scores
            .insert(subject.name.clone(), subject_score);
    }

    report.total_score = round2(report.total_score);
    report.net = round2(report.correct_count as f64 - report.wrong_count as f64 / 4.0);
    report.success_rate = if report.total_questions > 0 {
        round2(report.correct_count as f64 / report.total_questions as f64 * 100.0)
    } else {
        0.0
    };
    report
}
