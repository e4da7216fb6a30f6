//! autograde-report: renders a [`BatchReport`](autograde_core::report::BatchReport)
//! as CSV tables or a self-contained HTML page.

pub mod csv_report;
pub mod html;

pub use csv_report::{write_detail_csv, write_summary_csv};
pub use html::{generate_html, write_html_report};
