//! Core data model types for autograde.
//!
//! Answer keys and student answers are inputs loaded once per batch run.
//! Question scores and student results are produced fresh by each run.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// One question of the answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerKeyEntry {
    /// Question number, unique across the key and >= 1.
    pub question_no: u32,
    /// The question as posed to students.
    pub question_text: String,
    /// The reference answer graders compare against.
    pub reference_answer: String,
    /// Maximum marks available for this question.
    pub max_marks: f64,
}

/// A validated, immutable answer key indexed by question number.
#[derive(Debug, Clone, Default)]
pub struct AnswerKey {
    entries: BTreeMap<u32, AnswerKeyEntry>,
}

impl AnswerKey {
    /// Build a key, rejecting duplicate numbers and non-positive max marks.
    pub fn new(entries: Vec<AnswerKeyEntry>) -> Result<Self, ConfigurationError> {
        let mut map = BTreeMap::new();
        for entry in entries {
            if entry.question_no == 0 {
                return Err(ConfigurationError::InvalidQuestionNumber(entry.question_no));
            }
            if !entry.max_marks.is_finite() || entry.max_marks <= 0.0 {
                return Err(ConfigurationError::InvalidMaxMarks {
                    question_no: entry.question_no,
                    max_marks: entry.max_marks,
                });
            }
            let question_no = entry.question_no;
            if map.insert(question_no, entry).is_some() {
                return Err(ConfigurationError::DuplicateQuestion(question_no));
            }
        }
        Ok(Self { entries: map })
    }

    pub fn get(&self, question_no: u32) -> Option<&AnswerKeyEntry> {
        self.entries.get(&question_no)
    }

    /// Entries in ascending question order.
    pub fn iter(&self) -> impl Iterator<Item = &AnswerKeyEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of max marks over the whole key.
    pub fn total_marks(&self) -> f64 {
        self.entries.values().map(|e| e.max_marks).sum()
    }
}

/// One student's answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentAnswer {
    pub student_name: String,
    pub question_no: u32,
    pub answer_text: String,
}

/// All answers of a single student, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub student_name: String,
    pub answers: Vec<StudentAnswer>,
}

/// Group answer rows into per-student submissions.
///
/// Students appear in order of first appearance; each student's answers keep
/// their relative input order.
pub fn group_by_student(answers: &[StudentAnswer]) -> Vec<Submission> {
    let mut submissions: Vec<Submission> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for answer in answers {
        let slot = *index
            .entry(answer.student_name.as_str())
            .or_insert_with(|| {
                submissions.push(Submission {
                    student_name: answer.student_name.clone(),
                    answers: Vec::new(),
                });
                submissions.len() - 1
            });
        submissions[slot].answers.push(answer.clone());
    }

    submissions
}

/// Check every answer row against the key before any grading starts.
pub fn validate_answers(
    key: &AnswerKey,
    answers: &[StudentAnswer],
) -> Result<(), ConfigurationError> {
    let mut seen = HashSet::new();
    for answer in answers {
        if key.get(answer.question_no).is_none() {
            return Err(ConfigurationError::UnknownQuestion {
                student: answer.student_name.clone(),
                question_no: answer.question_no,
            });
        }
        if !seen.insert((answer.student_name.as_str(), answer.question_no)) {
            return Err(ConfigurationError::DuplicateAnswer {
                student: answer.student_name.clone(),
                question_no: answer.question_no,
            });
        }
    }
    Ok(())
}

/// Where a question score came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreSource {
    /// Parsed from the remote scorer's response.
    Graded,
    /// Substituted by the fallback estimator.
    Fallback,
}

impl fmt::Display for ScoreSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreSource::Graded => write!(f, "graded"),
            ScoreSource::Fallback => write!(f, "fallback"),
        }
    }
}

/// Why a fallback score was substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// The grading call exceeded its deadline.
    Timeout,
    /// The grading call failed outright.
    RemoteFailure,
    /// The response had no usable line for this question.
    ParseMiss,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::Timeout => write!(f, "timeout"),
            FallbackReason::RemoteFailure => write!(f, "remote_failure"),
            FallbackReason::ParseMiss => write!(f, "parse_miss"),
        }
    }
}

/// The final score for one question of one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionScore {
    pub question_no: u32,
    /// Marks awarded, within `[0, max_marks]`.
    pub scored: f64,
    pub max_marks: f64,
    #[serde(default)]
    pub feedback: Option<String>,
    pub source: ScoreSource,
    /// Set only when `source` is [`ScoreSource::Fallback`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
}

impl QuestionScore {
    pub fn is_fallback(&self) -> bool {
        self.source == ScoreSource::Fallback
    }
}

/// A percentage that may be undefined when nothing was gradable.
///
/// Serializes as a number, or `null` when undefined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum Percentage {
    Defined(f64),
    Undefined,
}

impl Percentage {
    pub fn value(&self) -> Option<f64> {
        match self {
            Percentage::Defined(v) => Some(*v),
            Percentage::Undefined => None,
        }
    }
}

impl From<Option<f64>> for Percentage {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) => Percentage::Defined(v),
            None => Percentage::Undefined,
        }
    }
}

impl From<Percentage> for Option<f64> {
    fn from(value: Percentage) -> Self {
        value.value()
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Percentage::Defined(v) => write!(f, "{v:.2}%"),
            Percentage::Undefined => write!(f, "n/a"),
        }
    }
}

/// Aggregated result for one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentResult {
    pub student_name: String,
    /// Scores in the order the questions were requested.
    pub per_question: Vec<QuestionScore>,
    pub total_scored: f64,
    pub total_possible: f64,
    /// `100 * total_scored / total_possible`, rounded to 2 decimals.
    pub percentage: Percentage,
}

impl StudentResult {
    /// Number of questions that received a fallback score.
    pub fn fallback_count(&self) -> usize {
        self.per_question.iter().filter(|q| q.is_fallback()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(question_no: u32, max_marks: f64) -> AnswerKeyEntry {
        AnswerKeyEntry {
            question_no,
            question_text: format!("Question {question_no}"),
            reference_answer: "ref".into(),
            max_marks,
        }
    }

    fn answer(student: &str, question_no: u32) -> StudentAnswer {
        StudentAnswer {
            student_name: student.into(),
            question_no,
            answer_text: "text".into(),
        }
    }

    #[test]
    fn answer_key_rejects_bad_entries() {
        assert_eq!(
            AnswerKey::new(vec![entry(1, 5.0), entry(1, 3.0)]).unwrap_err(),
            ConfigurationError::DuplicateQuestion(1)
        );
        assert!(matches!(
            AnswerKey::new(vec![entry(2, 0.0)]).unwrap_err(),
            ConfigurationError::InvalidMaxMarks { question_no: 2, .. }
        ));
        assert!(matches!(
            AnswerKey::new(vec![entry(3, f64::NAN)]).unwrap_err(),
            ConfigurationError::InvalidMaxMarks { question_no: 3, .. }
        ));
        assert_eq!(
            AnswerKey::new(vec![entry(0, 5.0)]).unwrap_err(),
            ConfigurationError::InvalidQuestionNumber(0)
        );
    }

    #[test]
    fn answer_key_iterates_in_question_order() {
        let key = AnswerKey::new(vec![entry(3, 2.0), entry(1, 5.0), entry(2, 3.0)]).unwrap();
        let order: Vec<u32> = key.iter().map(|e| e.question_no).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(key.total_marks(), 10.0);
    }

    #[test]
    fn grouping_keeps_encounter_order() {
        let rows = vec![
            answer("Bob", 1),
            answer("Alice", 1),
            answer("Bob", 2),
            answer("Carol", 1),
            answer("Alice", 2),
        ];
        let groups = group_by_student(&rows);
        let names: Vec<&str> = groups.iter().map(|s| s.student_name.as_str()).collect();
        assert_eq!(names, vec!["Bob", "Alice", "Carol"]);
        assert_eq!(groups[0].answers.len(), 2);
        assert_eq!(groups[0].answers[1].question_no, 2);
    }

    #[test]
    fn validate_unknown_and_duplicate_answers() {
        let key = AnswerKey::new(vec![entry(1, 5.0)]).unwrap();
        assert!(validate_answers(&key, &[answer("Alice", 1)]).is_ok());
        assert_eq!(
            validate_answers(&key, &[answer("Alice", 7)]).unwrap_err(),
            ConfigurationError::UnknownQuestion {
                student: "Alice".into(),
                question_no: 7
            }
        );
        assert!(matches!(
            validate_answers(&key, &[answer("Alice", 1), answer("Alice", 1)]).unwrap_err(),
            ConfigurationError::DuplicateAnswer { question_no: 1, .. }
        ));
    }

    #[test]
    fn percentage_serializes_as_nullable_number() {
        assert_eq!(
            serde_json::to_string(&Percentage::Defined(70.0)).unwrap(),
            "70.0"
        );
        assert_eq!(serde_json::to_string(&Percentage::Undefined).unwrap(), "null");
        let parsed: Percentage = serde_json::from_str("null").unwrap();
        assert_eq!(parsed, Percentage::Undefined);
        assert_eq!(Percentage::Undefined.to_string(), "n/a");
    }

    #[test]
    fn score_source_display() {
        assert_eq!(ScoreSource::Graded.to_string(), "graded");
        assert_eq!(ScoreSource::Fallback.to_string(), "fallback");
        assert_eq!(FallbackReason::ParseMiss.to_string(), "parse_miss");
    }
}
