//! Grading prompt assembly.
//!
//! The response format requested here is the contract the score-line parser
//! relies on: one `Q<n>: <score>/<max>` line per question, each optionally
//! followed by a `Feedback: <text>` line.

use std::fmt::Write as _;

use crate::error::ConfigurationError;
use crate::model::{AnswerKey, AnswerKeyEntry, StudentAnswer};

/// A grading request for one student, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct GradingPrompt {
    pub student_name: String,
    /// The full prompt text.
    pub text: String,
    /// Answer-key rows for the requested questions, in request order.
    pub questions: Vec<AnswerKeyEntry>,
}

impl GradingPrompt {
    pub fn question_numbers(&self) -> Vec<u32> {
        self.questions.iter().map(|q| q.question_no).collect()
    }
}

const INSTRUCTIONS: &str = "\
Grade each student answer below against the expected answer.
Give partial marks generously.
Do NOT give zero unless the answer is totally wrong or irrelevant.

Return ONLY one line per question in exactly this format:
Q<number>: <score>/<max marks>
Feedback: <one short sentence>

The Feedback line is optional. Do not add any other text.";

/// Build the grading prompt for one student's answers.
///
/// At most `question_cap` answers are included, taken in input order.
pub fn build_prompt(
    student_name: &str,
    answers: &[StudentAnswer],
    key: &AnswerKey,
    question_cap: Option<usize>,
) -> Result<GradingPrompt, ConfigurationError> {
    let limit = question_cap.unwrap_or(answers.len());
    let mut questions = Vec::with_capacity(limit.min(answers.len()));
    let mut body = String::new();

    for answer in answers.iter().take(limit) {
        let entry = key
            .get(answer.question_no)
            .ok_or_else(|| ConfigurationError::UnknownQuestion {
                student: student_name.to_string(),
                question_no: answer.question_no,
            })?;

        let _ = write!(
            body,
            "Q{no}. Question: {question}\nExpected: {expected}\nStudent: {student}\nMarks: {marks}\n\n",
            no = entry.question_no,
            question = entry.question_text.trim(),
            expected = entry.reference_answer.trim(),
            student = answer.answer_text.trim(),
            marks = format_marks(entry.max_marks),
        );
        questions.push(entry.clone());
    }

    let expected_lines: Vec<String> = questions
        .iter()
        .map(|q| format!("Q{}: x/{}", q.question_no, format_marks(q.max_marks)))
        .collect();

    let text = format!(
        "{INSTRUCTIONS}\n\nExpected output lines:\n{}\n\n{}",
        expected_lines.join("\n"),
        body.trim_end()
    );

    Ok(GradingPrompt {
        student_name: student_name.to_string(),
        text,
        questions,
    })
}

/// Render marks without a trailing `.0` for whole numbers.
fn format_marks(marks: f64) -> String {
    if marks.fract() == 0.0 {
        format!("{marks:.0}")
    } else {
        format!("{marks}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> AnswerKey {
        AnswerKey::new(vec![
            AnswerKeyEntry {
                question_no: 1,
                question_text: "What is 2+2?".into(),
                reference_answer: "4".into(),
                max_marks: 5.0,
            },
            AnswerKeyEntry {
                question_no: 2,
                question_text: "Capital of France?".into(),
                reference_answer: "Paris".into(),
                max_marks: 2.5,
            },
        ])
        .unwrap()
    }

    fn answer(question_no: u32, text: &str) -> StudentAnswer {
        StudentAnswer {
            student_name: "Alice".into(),
            question_no,
            answer_text: text.into(),
        }
    }

    #[test]
    fn includes_every_question_and_format_contract() {
        let prompt =
            build_prompt("Alice", &[answer(1, "4"), answer(2, "Paris")], &key(), None).unwrap();

        assert_eq!(prompt.question_numbers(), vec![1, 2]);
        assert!(prompt.text.contains("Question: What is 2+2?"));
        assert!(prompt.text.contains("Expected: Paris"));
        assert!(prompt.text.contains("Student: Paris"));
        assert!(prompt.text.contains("Marks: 2.5"));
        assert!(prompt.text.contains("Q1: x/5"));
        assert!(prompt.text.contains("Q2: x/2.5"));
        assert!(prompt.text.contains("Feedback:"));
        assert!(prompt.text.contains("Do NOT give zero"));
    }

    #[test]
    fn question_cap_truncates_in_input_order() {
        let prompt =
            build_prompt("Alice", &[answer(2, "Paris"), answer(1, "4")], &key(), Some(1)).unwrap();
        assert_eq!(prompt.question_numbers(), vec![2]);
        assert!(!prompt.text.contains("What is 2+2?"));
    }

    #[test]
    fn unknown_question_is_configuration_error() {
        let err = build_prompt("Alice", &[answer(9, "?")], &key(), None).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnknownQuestion {
                student: "Alice".into(),
                question_no: 9
            }
        );
    }

    #[test]
    fn student_name_is_not_sent_to_grader() {
        let prompt = build_prompt("Alice", &[answer(1, "4")], &key(), None).unwrap();
        assert!(!prompt.text.contains("Alice"));
    }
}
