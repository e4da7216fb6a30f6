//! CSV exports: one summary row per student and one detail row per
//! (student, question).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use autograde_core::report::BatchReport;

const SUMMARY_HEADER: [&str; 6] = [
    "student_name",
    "total_scored",
    "total_possible",
    "percentage",
    "graded_questions",
    "fallback_questions",
];

const DETAIL_HEADER: [&str; 7] = [
    "student_name",
    "question_no",
    "scored",
    "max_marks",
    "source",
    "fallback_reason",
    "feedback",
];

/// Write the per-student summary. An undefined percentage is an empty cell.
pub fn summary_csv<W: Write>(report: &BatchReport, out: W) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(out);
    writer.write_record(SUMMARY_HEADER)?;

    for student in &report.students {
        let fallbacks = student.fallback_count();
        writer.write_record([
            student.student_name.clone(),
            student.total_scored.to_string(),
            student.total_possible.to_string(),
            student
                .percentage
                .value()
                .map(|p| format!("{p:.2}"))
                .unwrap_or_default(),
            (student.per_question.len() - fallbacks).to_string(),
            fallbacks.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write every question score with its source and feedback.
pub fn detail_csv<W: Write>(report: &BatchReport, out: W) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(out);
    writer.write_record(DETAIL_HEADER)?;

    for row in report.question_rows() {
        writer.write_record([
            row.student_name,
            row.question_no.to_string(),
            row.scored.to_string(),
            row.max_marks.to_string(),
            row.source.to_string(),
            row.fallback_reason
                .map(|r| r.to_string())
                .unwrap_or_default(),
            row.feedback.unwrap_or_default(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_summary_csv(report: &BatchReport, path: &Path) -> Result<()> {
    let file = create(path)?;
    summary_csv(report, file).with_context(|| format!("failed to write {}", path.display()))
}

pub fn write_detail_csv(report: &BatchReport, path: &Path) -> Result<()> {
    let file = create(path)?;
    detail_csv(report, file).with_context(|| format!("failed to write {}", path.display()))
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}
