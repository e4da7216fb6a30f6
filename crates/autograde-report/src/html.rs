//! HTML report generator.
//!
//! Produces a self-contained HTML file with all CSS/JS inlined.

use anyhow::Result;
use std::path::Path;

use autograde_core::model::StudentResult;
use autograde_core::report::BatchReport;

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn format_optional_pct(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}%"))
}

/// Generate an HTML report from a batch report.
pub fn generate_html(report: &BatchReport) -> String {
    let mut html = String::new();
    let summary = &report.summary;

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>autograde report: {}/{}</title>\n",
        html_escape(&report.provider),
        html_escape(&report.model)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    // Header
    html.push_str("<header>\n");
    html.push_str("<h1>autograde report</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">Scorer: <strong>{}/{}</strong> | {} students | fallback fraction {:.2} | {}</p>\n",
        html_escape(&report.provider),
        html_escape(&report.model),
        summary.students_graded,
        report.fallback_fraction,
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if report.cancelled {
        html.push_str(&format!(
            "<p class=\"warning\">Run cancelled. Not graded: {}</p>\n",
            html_escape(&report.not_graded.join(", "))
        ));
    }
    html.push_str("</header>\n");

    // Summary dashboard
    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Summary</h2>\n");
    html.push_str("<table class=\"summary\">\n");
    html.push_str("<thead><tr><th>Questions</th><th>Graded</th><th>Fallback</th><th>All-fallback students</th><th>Average</th><th>Highest</th><th>Lowest</th></tr></thead>\n");
    html.push_str(&format!(
        "<tbody><tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr></tbody>\n",
        summary.questions_scored,
        summary.graded_count,
        summary.fallback_count,
        summary.fully_fallback_students,
        format_optional_pct(summary.average_percentage),
        format_optional_pct(summary.highest_percentage),
        format_optional_pct(summary.lowest_percentage),
    ));
    html.push_str("</table>\n");

    if !report.students.is_empty() {
        html.push_str(&generate_bar_chart(&report.students));
    }
    html.push_str("</section>\n");

    // Per-student totals
    html.push_str("<section class=\"students\">\n");
    html.push_str("<h2>Students</h2>\n");
    html.push_str("<table class=\"results-table\" id=\"students\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable('students', 0)\">Student</th><th onclick=\"sortTable('students', 1)\">Scored</th><th onclick=\"sortTable('students', 2)\">Possible</th><th onclick=\"sortTable('students', 3)\">Percentage</th><th onclick=\"sortTable('students', 4)\">Fallbacks</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for student in &report.students {
        let fallbacks = student.fallback_count();
        let row_class = if fallbacks == 0 { "pass" } else { "review" };
        html.push_str(&format!(
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}/{}</td></tr>\n",
            row_class,
            html_escape(&student.student_name),
            student.total_scored,
            student.total_possible,
            student.percentage,
            fallbacks,
            student.per_question.len()
        ));
    }
    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");

    // Per-question detail
    html.push_str("<section class=\"results\">\n");
    html.push_str("<h2>Question scores</h2>\n");
    html.push_str("<table class=\"results-table\" id=\"questions\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable('questions', 0)\">Student</th><th onclick=\"sortTable('questions', 1)\">Question</th><th onclick=\"sortTable('questions', 2)\">Score</th><th onclick=\"sortTable('questions', 3)\">Source</th><th>Feedback</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for row in report.question_rows() {
        let (row_class, source_text) = match row.fallback_reason {
            Some(reason) => ("review", format!("{} ({})", row.source, reason)),
            None => ("pass", row.source.to_string()),
        };
        html.push_str(&format!(
            "<tr class=\"{}\"><td>{}</td><td>Q{}</td><td>{}/{}</td><td>{}</td><td>{}</td></tr>\n",
            row_class,
            html_escape(&row.student_name),
            row.question_no,
            row.scored,
            row.max_marks,
            source_text,
            html_escape(row.feedback.as_deref().unwrap_or("-"))
        ));
    }
    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(
        &serde_json::to_string_pretty(report)
            .unwrap_or_default()
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;"),
    );
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write an HTML report to a file.
pub fn write_html_report(report: &BatchReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    Ok(())
}

fn generate_bar_chart(students: &[StudentResult]) -> String {
    let bar_height = 24;
    let max_width = 400;
    let padding = 8;
    let label_width = 200;

    let total_height = students.len() * (bar_height + padding) + padding;

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        label_width + max_width + 60,
        total_height
    );

    for (i, student) in students.iter().enumerate() {
        let y = i * (bar_height + padding) + padding;
        let pct = student.percentage.value();
        let width = (pct.unwrap_or(0.0).clamp(0.0, 100.0) / 100.0 * max_width as f64) as usize;

        let color = match pct {
            Some(p) if p >= 80.0 => "#22c55e",
            Some(p) if p >= 50.0 => "#eab308",
            Some(_) => "#ef4444",
            None => "#9ca3af",
        };

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"14\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>\n",
            label_width - 10,
            y + bar_height / 2,
            html_escape(&student.student_name)
        ));
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" rx=\"4\"/>\n",
            label_width, y, width, bar_height, color
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" dominant-baseline=\"middle\">{}</text>\n",
            label_width + width + 8,
            y + bar_height / 2,
            student.percentage
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --review: #fef3c7; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --review: #78350f; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
.warning { color: #b45309; font-weight: bold; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); cursor: pointer; }
.pass { background: var(--pass); }
.review { background: var(--review); }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(id, col) {
  const table = document.getElementById(id);
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col].textContent;
    const vb = b.cells[col].textContent;
    return asc ? va.localeCompare(vb, undefined, {numeric: true}) : vb.localeCompare(va, undefined, {numeric: true});
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use autograde_core::model::{FallbackReason, QuestionScore, ScoreSource};
    use autograde_core::statistics::{summarize_batch, summarize_student};

    pub(crate) fn make_test_report() -> BatchReport {
        let students = vec![
            summarize_student(
                "Alice",
                vec![
                    QuestionScore {
                        question_no: 1,
                        scored: 4.0,
                        max_marks: 5.0,
                        feedback: Some("Good, but terse".into()),
                        source: ScoreSource::Graded,
                        fallback_reason: None,
                    },
                    QuestionScore {
                        question_no: 2,
                        scored: 3.0,
                        max_marks: 5.0,
                        feedback: None,
                        source: ScoreSource::Fallback,
                        fallback_reason: Some(FallbackReason::Timeout),
                    },
                ],
            ),
            summarize_student("Nobody", Vec::new()),
        ];

        BatchReport {
            id: uuid::Uuid::nil(),
            created_at: chrono::Utc::now(),
            provider: "gemini".into(),
            model: "gemini-2.0-flash-lite".into(),
            fallback_fraction: 0.6,
            summary: summarize_batch(&students),
            students,
            cancelled: false,
            not_graded: Vec::new(),
            duration_ms: 1000,
        }
    }

    #[test]
    fn html_report_contains_required_elements() {
        let report = make_test_report();
        let html = generate_html(&report);

        assert!(html.contains("<html"));
        assert!(html.contains("</html>"));
        assert!(html.contains("gemini/gemini-2.0-flash-lite"));
        assert!(html.contains("70.00%"));
        assert!(html.contains("fallback (timeout)"));
        assert!(html.contains("n/a"));
        assert!(!html.contains("Run cancelled"));
    }

    #[test]
    fn student_names_are_escaped() {
        let mut report = make_test_report();
        report.students[0].student_name = "<script>alert(1)</script>".into();
        let html = generate_html(&report);
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    }

    #[test]
    fn cancelled_runs_list_ungraded_students() {
        let mut report = make_test_report();
        report.cancelled = true;
        report.not_graded = vec!["Carol".into(), "Dan".into()];
        let html = generate_html(&report);
        assert!(html.contains("Run cancelled. Not graded: Carol, Dan"));
    }

    #[test]
    fn html_report_write_to_file() {
        let report = make_test_report();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.html");

        write_html_report(&report, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<html"));
    }
}
