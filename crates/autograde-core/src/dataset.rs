//! CSV loading for answer keys and student answers.
//!
//! Column names must match exactly: `question_no,question_text,
//! reference_answer,max_marks` for the key and
//! `student_name,question_no,answer_text` for the answers. Normalizing
//! other layouts into these is the caller's job.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use crate::model::{group_by_student, AnswerKey, AnswerKeyEntry, StudentAnswer};

/// Read and validate an answer key CSV file.
pub fn load_answer_key(path: &Path) -> Result<AnswerKey> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open answer key: {}", path.display()))?;
    read_answer_key(file).with_context(|| format!("invalid answer key: {}", path.display()))
}

/// Read an answer key from any CSV source.
pub fn read_answer_key<R: Read>(reader: R) -> Result<AnswerKey> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let entries = csv
        .deserialize::<AnswerKeyEntry>()
        .enumerate()
        .map(|(idx, row)| row.with_context(|| format!("answer key row {}", idx + 2)))
        .collect::<Result<Vec<_>>>()?;
    Ok(AnswerKey::new(entries)?)
}

/// Read the student answers CSV file.
pub fn load_student_answers(path: &Path) -> Result<Vec<StudentAnswer>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open student answers: {}", path.display()))?;
    read_student_answers(file)
        .with_context(|| format!("invalid student answers: {}", path.display()))
}

/// Read student answers from any CSV source.
pub fn read_student_answers<R: Read>(reader: R) -> Result<Vec<StudentAnswer>> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    csv.deserialize::<StudentAnswer>()
        .enumerate()
        .map(|(idx, row)| row.with_context(|| format!("student answers row {}", idx + 2)))
        .collect()
}

/// A non-fatal observation about the input data.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    /// The student concerned, if any.
    pub student_name: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Look for suspicious but gradable input.
///
/// Fatal problems (unknown questions, duplicate rows) are reported by
/// [`crate::model::validate_answers`] instead.
pub fn validate_dataset(key: &AnswerKey, answers: &[StudentAnswer]) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if key.is_empty() {
        warnings.push(ValidationWarning {
            student_name: None,
            message: "answer key is empty".into(),
        });
    }

    for answer in answers {
        if answer.answer_text.trim().is_empty() {
            warnings.push(ValidationWarning {
                student_name: Some(answer.student_name.clone()),
                message: format!("answer to question {} is blank", answer.question_no),
            });
        }
        if answer.student_name.trim().is_empty() {
            warnings.push(ValidationWarning {
                student_name: None,
                message: format!("answer to question {} has no student name", answer.question_no),
            });
        }
    }

    let answered: HashSet<u32> = answers.iter().map(|a| a.question_no).collect();
    for entry in key.iter() {
        if !answered.contains(&entry.question_no) {
            warnings.push(ValidationWarning {
                student_name: None,
                message: format!("question {} is not answered by any student", entry.question_no),
            });
        }
    }

    for submission in group_by_student(answers) {
        let missing: Vec<String> = key
            .iter()
            .filter(|e| !submission.answers.iter().any(|a| a.question_no == e.question_no))
            .map(|e| e.question_no.to_string())
            .collect();
        if !missing.is_empty() && missing.len() < key.len() {
            warnings.push(ValidationWarning {
                student_name: Some(submission.student_name.clone()),
                message: format!("no answer for question(s) {}", missing.join(", ")),
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_CSV: &str = "\
question_no,question_text,reference_answer,max_marks
1,What is 2+2?,4,5
2,Capital of France?,Paris,2.5
";

    const ANSWERS_CSV: &str = "\
student_name,question_no,answer_text
Alice,1,4
Alice,2,\"Paris, France\"
Bob,1,five
";

    #[test]
    fn reads_answer_key() {
        let key = read_answer_key(KEY_CSV.as_bytes()).unwrap();
        assert_eq!(key.len(), 2);
        assert_eq!(key.get(2).unwrap().max_marks, 2.5);
        assert_eq!(key.get(1).unwrap().reference_answer, "4");
    }

    #[test]
    fn reads_student_answers_with_quoted_fields() {
        let answers = read_student_answers(ANSWERS_CSV.as_bytes()).unwrap();
        assert_eq!(answers.len(), 3);
        assert_eq!(answers[1].answer_text, "Paris, France");
        assert_eq!(answers[2].student_name, "Bob");
    }

    #[test]
    fn padded_answer_fields_are_trimmed() {
        let csv = "student_name, question_no, answer_text\nAlice ,1,4\n Alice, 2 , Paris \n";
        let answers = read_student_answers(csv.as_bytes()).unwrap();
        assert_eq!(answers[0].student_name, "Alice");
        assert_eq!(answers[1].student_name, "Alice");
        assert_eq!(answers[1].question_no, 2);
        assert_eq!(answers[1].answer_text, "Paris");
        assert_eq!(group_by_student(&answers).len(), 1);
    }

    #[test]
    fn wrong_headers_are_rejected() {
        let csv = "question,answer,marks\n1,4,5\n";
        assert!(read_answer_key(csv.as_bytes()).is_err());
    }

    #[test]
    fn bad_max_marks_are_rejected() {
        let csv = "question_no,question_text,reference_answer,max_marks\n1,q,a,0\n";
        let err = read_answer_key(csv.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("invalid max marks"));
    }

    #[test]
    fn loads_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("key.csv");
        let answers_path = dir.path().join("answers.csv");
        std::fs::write(&key_path, KEY_CSV).unwrap();
        std::fs::write(&answers_path, ANSWERS_CSV).unwrap();

        assert_eq!(load_answer_key(&key_path).unwrap().len(), 2);
        assert_eq!(load_student_answers(&answers_path).unwrap().len(), 3);
        assert!(load_answer_key(&dir.path().join("missing.csv")).is_err());
    }

    #[test]
    fn warns_about_gaps_and_blanks() {
        let key = read_answer_key(KEY_CSV.as_bytes()).unwrap();
        let mut answers = read_student_answers(ANSWERS_CSV.as_bytes()).unwrap();
        answers.push(StudentAnswer {
            student_name: "Carol".into(),
            question_no: 1,
            answer_text: "   ".into(),
        });

        let warnings = validate_dataset(&key, &answers);
        assert!(warnings
            .iter()
            .any(|w| w.student_name.as_deref() == Some("Carol") && w.message.contains("blank")));
        assert!(warnings
            .iter()
            .any(|w| w.student_name.as_deref() == Some("Bob") && w.message.contains("question(s) 2")));
        assert!(!warnings
            .iter()
            .any(|w| w.student_name.as_deref() == Some("Alice")));
    }
}
