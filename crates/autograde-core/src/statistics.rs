//! Per-student totals and batch-level summary statistics.

use serde::{Deserialize, Serialize};

use crate::model::{Percentage, QuestionScore, StudentResult};

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `100 * scored / possible` rounded to 2 decimals, undefined when
/// `possible` is zero.
pub fn percentage(scored: f64, possible: f64) -> Percentage {
    if possible > 0.0 {
        Percentage::Defined(round2(100.0 * scored / possible))
    } else {
        Percentage::Undefined
    }
}

/// Fold a student's question scores into a [`StudentResult`].
pub fn summarize_student(student_name: &str, per_question: Vec<QuestionScore>) -> StudentResult {
    let total_scored: f64 = per_question.iter().map(|q| q.scored).sum();
    let total_possible: f64 = per_question.iter().map(|q| q.max_marks).sum();
    if total_possible <= 0.0 {
        tracing::warn!(student = student_name, "no gradable questions, percentage undefined");
    }

    StudentResult {
        student_name: student_name.to_string(),
        percentage: percentage(total_scored, total_possible),
        total_scored: round2(total_scored),
        total_possible: round2(total_possible),
        per_question,
    }
}

/// Batch-wide counts and averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Students with a result in the report.
    pub students_graded: usize,
    /// Question scores across all students.
    pub questions_scored: usize,
    pub graded_count: usize,
    pub fallback_count: usize,
    /// Students for which every question fell back.
    pub fully_fallback_students: usize,
    /// Mean of the defined student percentages.
    pub average_percentage: Option<f64>,
    pub highest_percentage: Option<f64>,
    pub lowest_percentage: Option<f64>,
}

pub fn summarize_batch(results: &[StudentResult]) -> BatchSummary {
    let questions_scored = results.iter().map(|r| r.per_question.len()).sum();
    let fallback_count = results.iter().map(|r| r.fallback_count()).sum();
    let fully_fallback_students = results
        .iter()
        .filter(|r| !r.per_question.is_empty() && r.fallback_count() == r.per_question.len())
        .count();

    let defined: Vec<f64> = results
        .iter()
        .filter_map(|r| r.percentage.value())
        .collect();
    let average_percentage = if defined.is_empty() {
        None
    } else {
        Some(round2(defined.iter().sum::<f64>() / defined.len() as f64))
    };

    BatchSummary {
        students_graded: results.len(),
        questions_scored,
        graded_count: questions_scored - fallback_count,
        fallback_count,
        fully_fallback_students,
        average_percentage,
        highest_percentage: defined.iter().copied().reduce(f64::max),
        lowest_percentage: defined.iter().copied().reduce(f64::min),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FallbackReason, ScoreSource};

    fn score(question_no: u32, scored: f64, max: f64, source: ScoreSource) -> QuestionScore {
        QuestionScore {
            question_no,
            scored,
            max_marks: max,
            feedback: None,
            source,
            fallback_reason: (source == ScoreSource::Fallback).then_some(FallbackReason::Timeout),
        }
    }

    #[test]
    fn mixed_sources_aggregate() {
        let result = summarize_student(
            "Alice",
            vec![
                score(1, 3.0, 5.0, ScoreSource::Graded),
                score(2, 4.0, 5.0, ScoreSource::Fallback),
            ],
        );
        assert_eq!(result.total_scored, 7.0);
        assert_eq!(result.total_possible, 10.0);
        assert_eq!(result.percentage, Percentage::Defined(70.0));
        assert_eq!(result.fallback_count(), 1);
    }

    #[test]
    fn zero_questions_is_undefined_not_a_panic() {
        let result = summarize_student("Nobody", Vec::new());
        assert_eq!(result.total_possible, 0.0);
        assert_eq!(result.percentage, Percentage::Undefined);
    }

    #[test]
    fn percentage_rounds_to_two_decimals() {
        assert_eq!(percentage(1.0, 3.0), Percentage::Defined(33.33));
        assert_eq!(percentage(2.0, 3.0), Percentage::Defined(66.67));
        assert_eq!(percentage(1.0, 0.0), Percentage::Undefined);
    }

    #[test]
    fn batch_summary_counts() {
        let results = vec![
            summarize_student(
                "A",
                vec![
                    score(1, 5.0, 5.0, ScoreSource::Graded),
                    score(2, 3.0, 5.0, ScoreSource::Fallback),
                ],
            ),
            summarize_student("B", vec![score(1, 3.0, 5.0, ScoreSource::Fallback)]),
            summarize_student("C", Vec::new()),
        ];
        let summary = summarize_batch(&results);
        assert_eq!(summary.students_graded, 3);
        assert_eq!(summary.questions_scored, 3);
        assert_eq!(summary.graded_count, 1);
        assert_eq!(summary.fallback_count, 2);
        assert_eq!(summary.fully_fallback_students, 1);
        assert_eq!(summary.average_percentage, Some(70.0));
        assert_eq!(summary.highest_percentage, Some(80.0));
        assert_eq!(summary.lowest_percentage, Some(60.0));
    }

    #[test]
    fn empty_batch_has_no_averages() {
        let summary = summarize_batch(&[]);
        assert_eq!(summary.students_graded, 0);
        assert_eq!(summary.average_percentage, None);
    }
}
