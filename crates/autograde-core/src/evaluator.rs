//! Per-student grading: build the prompt, call the grader, parse, recover.
//!
//! Once the prompt is built, evaluation always completes with exactly one
//! score per requested question. Invocation failures become whole-student
//! fallbacks; questions missing from an otherwise good response are
//! recovered one by one.

use std::time::Duration;

use crate::cache::ResponseCache;
use crate::error::{ConfigurationError, InvocationFailure};
use crate::fallback::FallbackEstimator;
use crate::invoker::GradingInvoker;
use crate::model::{AnswerKey, AnswerKeyEntry, FallbackReason, QuestionScore, ScoreSource, Submission};
use crate::prompt::build_prompt;
use crate::score_line::{parse_score_lines, ParsedScore};

/// Knobs that shape one student's evaluation.
#[derive(Debug, Clone)]
pub struct EvaluatorSettings {
    /// Hard deadline for each grading call.
    pub timeout: Duration,
    /// Maximum number of answers graded per student.
    pub question_cap: Option<usize>,
    pub fallback: FallbackEstimator,
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            question_cap: None,
            fallback: FallbackEstimator::default(),
        }
    }
}

/// Grades one student at a time against a shared answer key.
pub struct StudentEvaluator<'a> {
    key: &'a AnswerKey,
    invoker: &'a GradingInvoker,
    settings: &'a EvaluatorSettings,
    cache: Option<&'a ResponseCache>,
}

impl<'a> StudentEvaluator<'a> {
    pub fn new(
        key: &'a AnswerKey,
        invoker: &'a GradingInvoker,
        settings: &'a EvaluatorSettings,
    ) -> Self {
        Self {
            key,
            invoker,
            settings,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: &'a ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Grade `submission`, returning one score per requested question.
    ///
    /// Only a submission referencing a question missing from the key fails.
    pub async fn evaluate(
        &self,
        submission: &Submission,
    ) -> Result<Vec<QuestionScore>, ConfigurationError> {
        let student = submission.student_name.as_str();

        let prompt = build_prompt(
            student,
            &submission.answers,
            self.key,
            self.settings.question_cap,
        )?;
        if prompt.questions.is_empty() {
            tracing::debug!(student, "no questions to grade");
            return Ok(Vec::new());
        }
        let skipped = submission.answers.len() - prompt.questions.len();
        if skipped > 0 {
            tracing::debug!(student, skipped, "answers beyond question cap not graded");
        }

        let scores = match self
            .invoker
            .invoke_cached(&prompt, self.settings.timeout, self.cache)
            .await
        {
            Ok(raw) => {
                let parsed = parse_score_lines(&raw.content);
                if parsed.is_empty() {
                    tracing::warn!(student, "grader response had no score lines");
                }
                prompt
                    .questions
                    .iter()
                    .map(|entry| self.resolve(student, entry, parsed.get(&entry.question_no)))
                    .collect()
            }
            Err(failure) => {
                let reason = match &failure {
                    InvocationFailure::Timeout(_) => FallbackReason::Timeout,
                    InvocationFailure::RemoteFailure(_) => FallbackReason::RemoteFailure,
                };
                tracing::warn!(
                    student,
                    error = %failure,
                    "grading call failed, using fallback scores for all questions"
                );
                prompt
                    .questions
                    .iter()
                    .map(|entry| self.settings.fallback.estimate(entry, reason))
                    .collect()
            }
        };

        Ok(scores)
    }

    /// Accept a parsed score on the key's scale, or fall back for this question.
    fn resolve(
        &self,
        student: &str,
        entry: &AnswerKeyEntry,
        parsed: Option<&ParsedScore>,
    ) -> QuestionScore {
        let Some(parsed) = parsed.filter(|p| p.max > 0.0 && p.scored.is_finite()) else {
            tracing::warn!(
                student,
                question = entry.question_no,
                "no usable score line, using fallback"
            );
            return self
                .settings
                .fallback
                .estimate(entry, FallbackReason::ParseMiss);
        };

        let mut scored = parsed.scored;
        if (parsed.max - entry.max_marks).abs() > f64::EPSILON {
            tracing::debug!(
                student,
                question = entry.question_no,
                reported_max = parsed.max,
                key_max = entry.max_marks,
                "rescaling score to answer key marks"
            );
            scored = scored / parsed.max * entry.max_marks;
        }

        QuestionScore {
            question_no: entry.question_no,
            scored: scored.clamp(0.0, entry.max_marks),
            max_marks: entry.max_marks,
            feedback: parsed.feedback.clone(),
            source: ScoreSource::Graded,
            fallback_reason: None,
        }
    }
}
