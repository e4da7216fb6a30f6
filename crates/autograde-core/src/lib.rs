//! autograde-core: grading orchestration, score parsing, and fallback recovery.
//!
//! This crate defines the data model, the remote scorer trait, and the
//! machinery that turns free-text grader replies into per-question scores,
//! substituting deterministic fallback scores whenever grading fails.

pub mod cache;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod fallback;
pub mod invoker;
pub mod model;
pub mod prompt;
pub mod report;
pub mod score_line;
pub mod statistics;
pub mod traits;

#[cfg(test)]
mod testing;
