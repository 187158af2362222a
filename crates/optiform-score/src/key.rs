//! The authoritative correct-answer structure for one exam.

use serde::{Deserialize, Serialize};

/// One subject: ordered correct letters and a parallel list of point
/// values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    pub answers: Vec<char>,
    pub points: Vec<f64>,
}

impl Subject {
    pub fn uniform(name: &str, answers: &[char], points_each: f64) -> Self {
        Self {
            name: name.to_string(),
            answers: answers.to_vec(),
            points: vec![points_each; answers.len()],
        }
    }
}

/// Ordered subjects; question numbering concatenates them in this order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnswerKey {
    pub exam_name: String,
    pub subjects: Vec<Subject>,
}

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("subject '{0}' has {1} answers but {2} point values")]
    MismatchedPoints(String, usize, usize),
    #[error("answer key has no subjects")]
    Empty,
}

impl AnswerKey {
    pub fn total_questions(&self) -> usize {
        self.subjects.iter().map(|s| s.answers.len()).sum()
    }

    /// Every subject must pair each answer with a point value.
    pub fn validate(&self) -> Result<(), KeyError> {
        if self.subjects.is_empty() {
            return Err(KeyError::Empty);
        }
        for s in &self.subjects {
            if s.answers.len() != s.points.len() {
                return Err(KeyError::MismatchedPoints(
                    s.name.clone(),
                    s.answers.len(),
                    s.points.len(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_subject_pairs_every_answer_with_points() {
        let s = Subject::uniform("Türkçe", &['A', 'B', 'C'], 2.5);
        assert_eq!(s.points, vec![2.5, 2.5, 2.5]);
    }

    #[test]
    fn validation_catches_mismatched_point_lists() {
        let key = AnswerKey {
            exam_name: "deneme".into(),
            subjects: vec![Subject {
                name: "Fen".into(),
                answers: vec!['A', 'B'],
                points: vec![1.0],
            }],
        };
        assert!(matches!(
            key.validate(),
            Err(KeyError::MismatchedPoints(_, 2, 1))
        ));

        let empty = AnswerKey {
            exam_name: "bos".into(),
            subjects: vec![],
        };
        assert!(matches!(empty.validate(), Err(KeyError::Empty)));
    }

    #[test]
    fn keys_round_trip_through_json() {
        let key = AnswerKey {
            exam_name: "deneme".into(),
            subjects: vec![Subject::uniform("Mat", &['E', 'D'], 2.0)],
        };
        let json = serde_json::to_string(&key).unwrap();
        let back: AnswerKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total_questions(), 2);
        assert_eq!(back.subjects[0].answers, vec!['E', 'D']);
    }
}
