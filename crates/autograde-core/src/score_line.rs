//! Score-line parser for grader responses.
//!
//! Graders are asked to answer with one `Q<n>: <score>/<max>` line per
//! question, optionally followed by a `Feedback: <text>` line. Everything
//! else in the response (greetings, markdown, explanations) is ignored.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

/// A score recovered from one response line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedScore {
    pub scored: f64,
    pub max: f64,
    pub feedback: Option<String>,
}

fn score_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bQ\s*(\d+)\s*:\s*(\d+(?:\.\d+)?|\.\d+)\s*/\s*(\d+(?:\.\d+)?|\.\d+)")
            .expect("score line pattern is valid")
    })
}

/// Parse a grader response into scores keyed by question number.
///
/// A feedback line attaches to the most recent score line; feedback before
/// any score line is dropped. When the same question is scored twice, the
/// later line wins and its feedback starts over.
pub fn parse_score_lines(text: &str) -> BTreeMap<u32, ParsedScore> {
    let mut scores: BTreeMap<u32, ParsedScore> = BTreeMap::new();
    let mut current: Option<u32> = None;

    for line in text.lines() {
        // Feedback text may quote a score; it never rescores.
        if let Some(feedback) = parse_feedback_line(line) {
            match current.and_then(|q| scores.get_mut(&q)) {
                Some(score) => score.feedback = Some(feedback),
                None => tracing::debug!("feedback before any score line, ignoring"),
            }
            continue;
        }

        if let Some((question_no, parsed)) = parse_score_line(line) {
            scores.insert(question_no, parsed);
            current = Some(question_no);
        }
    }

    scores
}

fn parse_score_line(line: &str) -> Option<(u32, ParsedScore)> {
    let caps = score_line_regex().captures(line)?;
    let question_no = caps.get(1)?.as_str().parse::<u32>().ok()?;
    let scored = caps.get(2)?.as_str().parse::<f64>().ok()?;
    let max = caps.get(3)?.as_str().parse::<f64>().ok()?;
    Some((
        question_no,
        ParsedScore {
            scored,
            max,
            feedback: None,
        },
    ))
}

/// Returns the trimmed remainder of a `Feedback` line, if non-empty.
fn parse_feedback_line(line: &str) -> Option<String> {
    let trimmed = line.trim_start().trim_start_matches(['*', '-', '>', ' ']);
    let head = trimmed.get(..8)?;
    if !head.eq_ignore_ascii_case("feedback") {
        return None;
    }
    let rest = &trimmed[8..];
    let remainder = match rest.find(':') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    let remainder = remainder.trim().trim_matches('*').trim();
    if remainder.is_empty() {
        None
    } else {
        Some(remainder.to_string())
    }
}
