//! The `autograde validate` command.

use std::path::PathBuf;

use anyhow::Result;

use autograde_core::dataset::{load_answer_key, load_student_answers, validate_dataset};
use autograde_core::model::{group_by_student, validate_answers};

pub fn execute(answer_key_path: PathBuf, answers_path: PathBuf) -> Result<()> {
    let key = load_answer_key(&answer_key_path)?;
    let answers = load_student_answers(&answers_path)?;

    println!(
        "Answer key: {} question(s), {} total marks",
        key.len(),
        key.total_marks()
    );
    println!(
        "Answers: {} row(s) from {} student(s)",
        answers.len(),
        group_by_student(&answers).len()
    );

    validate_answers(&key, &answers)?;

    let warnings = validate_dataset(&key, &answers);
    for w in &warnings {
        let prefix = w
            .student_name
            .as_ref()
            .map(|name| format!("  [{name}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("Inputs valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
