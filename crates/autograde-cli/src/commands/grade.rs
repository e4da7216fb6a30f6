//! The `autograde grade` command.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use autograde_core::dataset::{load_answer_key, load_student_answers};
use autograde_core::engine::{BatchRunner, ProgressReporter};
use autograde_core::model::StudentResult;
use autograde_core::report::BatchReport;
use autograde_providers::config::{load_config_from, provider_config_for};
use autograde_providers::create_provider;
use autograde_report::{write_detail_csv, write_html_report, write_summary_csv};

#[derive(Args)]
pub struct GradeArgs {
    /// Answer key CSV (question_no,question_text,reference_answer,max_marks)
    #[arg(long)]
    pub answer_key: PathBuf,

    /// Student answers CSV (student_name,question_no,answer_text)
    #[arg(long)]
    pub answers: PathBuf,

    /// Scorer as "provider/model" (e.g. "gemini/gemini-2.0-flash-lite")
    #[arg(long)]
    pub model: Option<String>,

    /// Per-student grading deadline in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Grade at most this many answers per student
    #[arg(long)]
    pub question_cap: Option<usize>,

    /// Grade at most this many students
    #[arg(long)]
    pub roster_cap: Option<usize>,

    /// Fraction of max marks awarded when grading fails (0.0 to 1.0)
    #[arg(long)]
    pub fallback_fraction: Option<f64>,

    /// Max concurrent grading calls
    #[arg(long)]
    pub parallelism: Option<usize>,

    /// Generation temperature
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Send a fresh request for every student even when prompts repeat
    #[arg(long)]
    pub no_cache: bool,

    /// Output directory
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Output formats: json, csv, html, all (comma-separated)
    #[arg(long, default_value = "json")]
    pub format: String,

    /// Config file path
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_student_start(&self, student: &str, position: usize, total: usize) {
        eprintln!("  Grading: {student} ({}/{total})", position + 1);
    }

    fn on_student_complete(&self, result: &StudentResult, completed: usize, total: usize) {
        let fallbacks = result.fallback_count();
        let note = if fallbacks > 0 {
            format!(", {fallbacks} fallback")
        } else {
            String::new()
        };
        eprintln!(
            "  Done [{completed}/{total}]: {} {}/{} ({}){note}",
            result.student_name, result.total_scored, result.total_possible, result.percentage,
        );
    }

    fn on_batch_complete(&self, total: usize, completed: usize, fallbacks: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {completed}/{total} students graded, {fallbacks} fallback score(s) ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

pub async fn execute(args: GradeArgs) -> Result<()> {
    let config = load_config_from(args.config.as_deref())?;

    let (provider_name, model) = match &args.model {
        Some(spec) => match spec.split_once('/') {
            Some((provider, model)) => (provider.to_string(), model.to_string()),
            None => (config.default_provider.clone(), spec.clone()),
        },
        None => (config.default_provider.clone(), config.default_model.clone()),
    };

    let mut batch = config.batch_config();
    if let Some(secs) = args.timeout {
        batch.timeout = Duration::from_secs(secs);
    }
    if args.question_cap.is_some() {
        batch.question_cap = args.question_cap;
    }
    if args.roster_cap.is_some() {
        batch.roster_cap = args.roster_cap;
    }
    if let Some(fraction) = args.fallback_fraction {
        batch.fallback_fraction = fraction;
    }
    if let Some(parallelism) = args.parallelism {
        batch.parallelism = parallelism;
    }
    if let Some(temperature) = args.temperature {
        batch.temperature = temperature;
    }
    if args.no_cache {
        batch.cache_responses = false;
    }
    anyhow::ensure!(batch.parallelism >= 1, "parallelism must be at least 1");
    anyhow::ensure!(!batch.timeout.is_zero(), "timeout must be at least 1 second");

    let formats = parse_formats(&args.format)?;
    let output = args.output.unwrap_or_else(|| config.output_dir.clone());

    let key = load_answer_key(&args.answer_key)?;
    let answers = load_student_answers(&args.answers)?;

    let provider = create_provider(&provider_config_for(&config, &provider_name)?)?;
    let runner = BatchRunner::new(provider, model.clone(), batch)?;

    eprintln!(
        "autograde v{}: grading {} answer(s) against {} question(s) with {provider_name}/{model}",
        env!("CARGO_PKG_VERSION"),
        answers.len(),
        key.len(),
    );
    eprintln!();

    let cancel = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let report = runner
        .run_until(&key, &answers, &ConsoleReporter, cancel)
        .await?;

    if report.cancelled {
        eprintln!(
            "Interrupted: saving partial results, {} student(s) not graded",
            report.not_graded.len()
        );
    }

    print_summary(&report);
    save_outputs(&report, &output, &formats)?;

    Ok(())
}

fn parse_formats(format: &str) -> Result<Vec<&str>> {
    let formats: Vec<&str> = if format == "all" {
        vec!["json", "csv", "html"]
    } else {
        format.split(',').map(str::trim).collect()
    };
    for fmt in &formats {
        anyhow::ensure!(
            matches!(*fmt, "json" | "csv" | "html"),
            "unknown output format '{fmt}', expected json, csv, html or all"
        );
    }
    Ok(formats)
}

fn save_outputs(report: &BatchReport, output: &Path, formats: &[&str]) -> Result<()> {
    std::fs::create_dir_all(output)
        .with_context(|| format!("failed to create output directory {}", output.display()))?;
    let timestamp = report.created_at.format("%Y-%m-%dT%H%M%S");

    for fmt in formats {
        match *fmt {
            "json" => {
                let path = output.join(format!("report-{timestamp}.json"));
                report.save_json(&path)?;
                eprintln!("Results saved to: {}", path.display());
            }
            "csv" => {
                let summary = output.join(format!("summary-{timestamp}.csv"));
                let detail = output.join(format!("detail-{timestamp}.csv"));
                write_summary_csv(report, &summary)?;
                write_detail_csv(report, &detail)?;
                eprintln!("CSV: {} and {}", summary.display(), detail.display());
            }
            "html" => {
                let path = output.join(format!("report-{timestamp}.html"));
                write_html_report(report, &path)?;
                eprintln!("HTML report: {}", path.display());
            }
            _ => {}
        }
    }
    Ok(())
}

fn print_summary(report: &BatchReport) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Student", "Score", "Percentage", "Graded", "Fallback"]);

    for student in &report.students {
        let fallbacks = student.fallback_count();
        table.add_row(vec![
            Cell::new(&student.student_name),
            Cell::new(format!("{}/{}", student.total_scored, student.total_possible)),
            Cell::new(student.percentage.to_string()),
            Cell::new(student.per_question.len() - fallbacks),
            Cell::new(fallbacks),
        ]);
    }

    println!("{table}");

    let summary = &report.summary;
    if let Some(avg) = summary.average_percentage {
        println!("Average: {avg:.2}%");
    }
    if summary.fallback_count > 0 {
        println!(
            "{} of {} question score(s) are fallback estimates; review before release.",
            summary.fallback_count, summary.questions_scored
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_are_checked() {
        assert_eq!(parse_formats("all").unwrap(), vec!["json", "csv", "html"]);
        assert_eq!(parse_formats("json, csv").unwrap(), vec!["json", "csv"]);
        assert!(parse_formats("sarif").is_err());
    }
}
