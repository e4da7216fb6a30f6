//! Deterministic placeholder scores for questions that could not be graded.

use crate::error::ConfigurationError;
use crate::model::{AnswerKeyEntry, FallbackReason, QuestionScore, ScoreSource};

/// Fraction of max marks awarded when grading is unavailable.
pub const DEFAULT_FALLBACK_FRACTION: f64 = 0.6;

/// Awards a fixed fraction of a question's max marks, rounded to one decimal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackEstimator {
    fraction: f64,
}

impl Default for FallbackEstimator {
    fn default() -> Self {
        Self {
            fraction: DEFAULT_FALLBACK_FRACTION,
        }
    }
}

impl FallbackEstimator {
    pub fn new(fraction: f64) -> Result<Self, ConfigurationError> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(ConfigurationError::InvalidFallbackFraction(fraction));
        }
        Ok(Self { fraction })
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    /// Placeholder marks for a question worth `max_marks`.
    pub fn marks_for(&self, max_marks: f64) -> f64 {
        let marks = (max_marks * self.fraction * 10.0).round() / 10.0;
        marks.clamp(0.0, max_marks)
    }

    pub fn estimate(&self, entry: &AnswerKeyEntry, reason: FallbackReason) -> QuestionScore {
        QuestionScore {
            question_no: entry.question_no,
            scored: self.marks_for(entry.max_marks),
            max_marks: entry.max_marks,
            feedback: None,
            source: ScoreSource::Fallback,
            fallback_reason: Some(reason),
        }
    }
}
