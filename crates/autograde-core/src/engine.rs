//! Batch runner.
//!
//! Grades every student of a roster against one answer key, folds the
//! question scores into per-student results, and assembles a report. By
//! default students are graded one at a time; with `parallelism > 1` up to
//! that many grading calls are in flight, each under its own deadline, and
//! the report is still ordered by roster.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::cache::ResponseCache;
use crate::error::ConfigurationError;
use crate::evaluator::{EvaluatorSettings, StudentEvaluator};
use crate::fallback::{FallbackEstimator, DEFAULT_FALLBACK_FRACTION};
use crate::invoker::{GradingInvoker, InvokerConfig};
use crate::model::{group_by_student, validate_answers, AnswerKey, StudentAnswer, StudentResult, Submission};
use crate::report::BatchReport;
use crate::statistics::{summarize_batch, summarize_student};
use crate::traits::LlmProvider;

/// Configuration for a batch run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Hard deadline for each student's grading call.
    pub timeout: Duration,
    /// Maximum answers graded per student.
    pub question_cap: Option<usize>,
    /// Maximum students graded per run, taken in roster order.
    pub roster_cap: Option<usize>,
    /// Fraction of max marks awarded when grading fails.
    pub fallback_fraction: f64,
    /// Maximum concurrent grading calls.
    pub parallelism: usize,
    /// Reuse replies for identical prompts within a run.
    pub cache_responses: bool,
    /// Temperature for generation.
    pub temperature: f64,
    /// Max tokens for generation.
    pub max_tokens: u32,
    /// Optional system prompt override.
    pub system_prompt_override: Option<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            question_cap: None,
            roster_cap: None,
            fallback_fraction: DEFAULT_FALLBACK_FRACTION,
            parallelism: 1,
            cache_responses: true,
            temperature: 0.0,
            max_tokens: 1024,
            system_prompt_override: None,
        }
    }
}

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_student_start(&self, student: &str, position: usize, total: usize);
    fn on_student_complete(&self, result: &StudentResult, completed: usize, total: usize);
    fn on_batch_complete(&self, total: usize, completed: usize, fallbacks: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_student_start(&self, _: &str, _: usize, _: usize) {}
    fn on_student_complete(&self, _: &StudentResult, _: usize, _: usize) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

/// Grades a roster against an answer key using one provider and model.
pub struct BatchRunner {
    invoker: GradingInvoker,
    settings: EvaluatorSettings,
    config: BatchConfig,
}

impl BatchRunner {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        config: BatchConfig,
    ) -> Result<Self, ConfigurationError> {
        let fallback = FallbackEstimator::new(config.fallback_fraction)?;
        let invoker = GradingInvoker::new(
            provider,
            InvokerConfig {
                model: model.into(),
                temperature: config.temperature,
                max_tokens: config.max_tokens,
                system_prompt_override: config.system_prompt_override.clone(),
            },
        );
        let settings = EvaluatorSettings {
            timeout: config.timeout,
            question_cap: config.question_cap,
            fallback,
        };
        Ok(Self {
            invoker,
            settings,
            config,
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Grade every student in `answers` and build a report.
    pub async fn run(
        &self,
        key: &AnswerKey,
        answers: &[StudentAnswer],
        progress: &dyn ProgressReporter,
    ) -> Result<BatchReport, ConfigurationError> {
        self.run_until(key, answers, progress, std::future::pending())
            .await
    }

    /// Like [`run`](Self::run), stopping early when `cancel` resolves.
    ///
    /// In-flight grading calls are dropped on cancellation; students already
    /// graded stay in the report, which is flagged as cancelled.
    pub async fn run_until<C>(
        &self,
        key: &AnswerKey,
        answers: &[StudentAnswer],
        progress: &dyn ProgressReporter,
        cancel: C,
    ) -> Result<BatchReport, ConfigurationError>
    where
        C: Future<Output = ()>,
    {
        let start = Instant::now();
        validate_answers(key, answers)?;

        let mut roster = group_by_student(answers);
        if let Some(cap) = self.config.roster_cap {
            if roster.len() > cap {
                tracing::info!(
                    roster = roster.len(),
                    cap,
                    "roster cap reached, grading the first {cap} students"
                );
                roster.truncate(cap);
            }
        }
        let total = roster.len();
        tracing::info!(
            students = total,
            provider = self.invoker.provider_name(),
            model = self.invoker.model(),
            "starting batch"
        );

        let cache = self.config.cache_responses.then(ResponseCache::new);
        let mut evaluator = StudentEvaluator::new(key, &self.invoker, &self.settings);
        if let Some(cache) = cache.as_ref() {
            evaluator = evaluator.with_cache(cache);
        }
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));

        let mut futures = FuturesUnordered::new();
        for (position, submission) in roster.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let evaluator = &evaluator;
            futures.push(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                progress.on_student_start(&submission.student_name, position, total);
                let scores = evaluator.evaluate(submission).await;
                (position, scores)
            });
        }

        let mut slots: Vec<Option<StudentResult>> = vec![None; total];
        let mut completed = 0usize;
        let mut cancelled = false;
        tokio::pin!(cancel);

        loop {
            tokio::select! {
                biased;
                _ = &mut cancel => {
                    tracing::warn!(completed, total, "batch cancelled, abandoning in-flight grading");
                    cancelled = true;
                    break;
                }
                next = futures.next() => {
                    let Some((position, scores)) = next else { break };
                    let submission: &Submission = &roster[position];
                    let result = summarize_student(&submission.student_name, scores?);
                    completed += 1;
                    progress.on_student_complete(&result, completed, total);
                    slots[position] = Some(result);
                }
            }
        }
        drop(futures);

        let not_graded: Vec<String> = roster
            .iter()
            .zip(&slots)
            .filter(|(_, slot)| slot.is_none())
            .map(|(s, _)| s.student_name.clone())
            .collect();
        let students: Vec<StudentResult> = slots.into_iter().flatten().collect();
        let summary = summarize_batch(&students);
        let elapsed = start.elapsed();
        progress.on_batch_complete(total, completed, summary.fallback_count, elapsed);

        if let Some(cache) = cache.as_ref() {
            tracing::debug!(entries = cache.len(), "response cache discarded");
        }

        Ok(BatchReport {
            id: Uuid::new_v4(),
            created_at: chrono::Utc::now(),
            provider: self.invoker.provider_name().to_string(),
            model: self.invoker.model().to_string(),
            fallback_fraction: self.settings.fallback.fraction(),
            students,
            summary,
            cancelled,
            not_graded,
            duration_ms: elapsed.as_millis() as u64,
        })
    }
}
