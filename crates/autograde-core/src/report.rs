//! Batch report types with JSON persistence and run-to-run comparison.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{FallbackReason, ScoreSource, StudentResult};
use crate::statistics::BatchSummary;

/// The outcome of one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    /// Provider that graded the batch.
    pub provider: String,
    /// Model that graded the batch.
    pub model: String,
    /// Fallback fraction in force for this run.
    pub fallback_fraction: f64,
    /// Per-student results in roster order.
    pub students: Vec<StudentResult>,
    /// Batch-wide counts.
    pub summary: BatchSummary,
    /// True when the run was stopped before every student was graded.
    #[serde(default)]
    pub cancelled: bool,
    /// Students left ungraded by a cancelled run, in roster order.
    #[serde(default)]
    pub not_graded: Vec<String>,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// One (student, question) row of the detail view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRow {
    pub student_name: String,
    pub question_no: u32,
    pub scored: f64,
    pub max_marks: f64,
    pub feedback: Option<String>,
    pub source: ScoreSource,
    pub fallback_reason: Option<FallbackReason>,
}

impl BatchReport {
    /// Flatten every student's scores into detail rows, in roster order.
    pub fn question_rows(&self) -> Vec<QuestionRow> {
        self.students
            .iter()
            .flat_map(|student| {
                student.per_question.iter().map(|q| QuestionRow {
                    student_name: student.student_name.clone(),
                    question_no: q.question_no,
                    scored: q.scored,
                    max_marks: q.max_marks,
                    feedback: q.feedback.clone(),
                    source: q.source,
                    fallback_reason: q.fallback_reason,
                })
            })
            .collect()
    }

    /// Rows that a human should review because they were not really graded.
    pub fn rows_needing_review(&self) -> Vec<QuestionRow> {
        self.question_rows()
            .into_iter()
            .filter(|r| r.source == ScoreSource::Fallback)
            .collect()
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: BatchReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Compare this report against a baseline run of the same roster.
    ///
    /// A student whose percentage moved by more than `threshold` percentage
    /// points either way is reported as drifted.
    pub fn compare(&self, baseline: &BatchReport, threshold: f64) -> DriftReport {
        let baseline_by_name: HashMap<&str, &StudentResult> = baseline
            .students
            .iter()
            .map(|s| (s.student_name.as_str(), s))
            .collect();

        let mut drifted = Vec::new();
        let mut unchanged = 0;
        let mut new_students = 0;
        let mut incomparable = 0;

        for current in &self.students {
            let Some(base) = baseline_by_name.get(current.student_name.as_str()) else {
                new_students += 1;
                continue;
            };
            let (Some(before), Some(after)) = (base.percentage.value(), current.percentage.value())
            else {
                incomparable += 1;
                continue;
            };
            let delta = after - before;
            if delta.abs() > threshold {
                drifted.push(StudentDrift {
                    student_name: current.student_name.clone(),
                    baseline_percentage: before,
                    current_percentage: after,
                    delta: crate::statistics::round2(delta),
                    baseline_fallbacks: base.fallback_count(),
                    current_fallbacks: current.fallback_count(),
                });
            } else {
                unchanged += 1;
            }
        }

        let current_names: std::collections::HashSet<&str> = self
            .students
            .iter()
            .map(|s| s.student_name.as_str())
            .collect();
        let missing_students = baseline
            .students
            .iter()
            .filter(|s| !current_names.contains(s.student_name.as_str()))
            .count();

        drifted.sort_by(|a, b| {
            b.delta
                .abs()
                .partial_cmp(&a.delta.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        DriftReport {
            threshold,
            drifted,
            unchanged,
            new_students,
            missing_students,
            incomparable,
        }
    }
}

/// Per-student differences between two runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    pub threshold: f64,
    /// Students whose percentage moved by more than the threshold, largest first.
    pub drifted: Vec<StudentDrift>,
    pub unchanged: usize,
    pub new_students: usize,
    pub missing_students: usize,
    /// Students with an undefined percentage in either run.
    pub incomparable: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentDrift {
    pub student_name: String,
    pub baseline_percentage: f64,
    pub current_percentage: f64,
    pub delta: f64,
    pub baseline_fallbacks: usize,
    pub current_fallbacks: usize,
}

impl DriftReport {
    pub fn has_drift(&self) -> bool {
        !self.drifted.is_empty()
    }

    /// Render as a markdown table.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str("## Grading drift\n\n");
        md.push_str(&format!(
            "{} drifted (> {:.1} pts), {} unchanged, {} new, {} missing\n\n",
            self.drifted.len(),
            self.threshold,
            self.unchanged,
            self.new_students,
            self.missing_students
        ));
        if !self.drifted.is_empty() {
            md.push_str("| Student | Baseline | Current | Delta | Fallbacks |\n");
            md.push_str("|---|---|---|---|---|\n");
            for d in &self.drifted {
                md.push_str(&format!(
                    "| {} | {:.2}% | {:.2}% | {:+.2} | {} -> {} |\n",
                    d.student_name,
                    d.baseline_percentage,
                    d.current_percentage,
                    d.delta,
                    d.baseline_fallbacks,
                    d.current_fallbacks
                ));
            }
        }
        md
    }
}
