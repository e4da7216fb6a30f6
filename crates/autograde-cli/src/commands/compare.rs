//! The `autograde compare` command.

use std::path::PathBuf;

use anyhow::Result;

use autograde_core::report::BatchReport;

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    threshold: f64,
    fail_on_drift: bool,
    format: String,
) -> Result<()> {
    anyhow::ensure!(threshold >= 0.0, "threshold must not be negative");

    let baseline = BatchReport::load_json(&baseline_path)?;
    let current = BatchReport::load_json(&current_path)?;

    if baseline.model != current.model {
        eprintln!(
            "Note: comparing different scorers ({} vs {})",
            baseline.model, current.model
        );
    }

    let report = current.compare(&baseline, threshold);

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", report.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            println!(
                "Comparison: {} drifted, {} unchanged (threshold {:.1} pts)",
                report.drifted.len(),
                report.unchanged,
                report.threshold
            );

            if !report.drifted.is_empty() {
                println!("\nDrifted:");
                for d in &report.drifted {
                    println!(
                        "  {} {:.2}% -> {:.2}% ({:+.2}) fallbacks {} -> {}",
                        d.student_name,
                        d.baseline_percentage,
                        d.current_percentage,
                        d.delta,
                        d.baseline_fallbacks,
                        d.current_fallbacks
                    );
                }
            }

            if report.new_students > 0 {
                println!("\n{} new student(s)", report.new_students);
            }
            if report.missing_students > 0 {
                println!("{} missing student(s)", report.missing_students);
            }
            if report.incomparable > 0 {
                println!("{} student(s) with no percentage in one run", report.incomparable);
            }
        }
    }

    if fail_on_drift && report.has_drift() {
        std::process::exit(1);
    }

    Ok(())
}
