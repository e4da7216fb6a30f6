//! Error types for grading runs.
//!
//! Only [`ConfigurationError`] ever crosses the core boundary as a hard
//! failure. [`InvocationFailure`] is absorbed by the evaluator and turned into
//! fallback scores. [`ProviderError`] lives here so the invoker can downcast
//! and classify provider failures without string matching.

use std::time::Duration;

use thiserror::Error;

/// Data-integrity violations in the answer key or the student answers.
///
/// These abort the whole batch before any remote call is made.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// A student answered a question that is not in the answer key.
    #[error("student '{student}' answered question {question_no}, which is not in the answer key")]
    UnknownQuestion { student: String, question_no: u32 },

    /// The answer key lists the same question number twice.
    #[error("answer key contains question {0} more than once")]
    DuplicateQuestion(u32),

    /// Question numbers start at 1.
    #[error("answer key question numbers must be >= 1, got {0}")]
    InvalidQuestionNumber(u32),

    /// Max marks must be a positive, finite number.
    #[error("question {question_no} has invalid max marks {max_marks}")]
    InvalidMaxMarks { question_no: u32, max_marks: f64 },

    /// A student has more than one answer row for the same question.
    #[error("student '{student}' has more than one answer for question {question_no}")]
    DuplicateAnswer { student: String, question_no: u32 },

    /// The fallback fraction must lie in `[0, 1]`.
    #[error("fallback fraction must be between 0.0 and 1.0, got {0}")]
    InvalidFallbackFraction(f64),
}

/// Why a grading call produced no usable text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvocationFailure {
    /// The call did not finish before the client-side deadline.
    #[error("grading call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Any other fault: transport, auth, quota, malformed response.
    #[error("grading call failed: {0}")]
    RemoteFailure(String),
}

/// Errors that can occur when interacting with an LLM provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The provider's own HTTP timeout fired.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl From<anyhow::Error> for InvocationFailure {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<ProviderError>() {
            Some(ProviderError::Timeout(secs)) => {
                InvocationFailure::Timeout(Duration::from_secs(*secs))
            }
            _ => InvocationFailure::RemoteFailure(format!("{err:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_timeout_classified_as_timeout() {
        let err = anyhow::Error::from(ProviderError::Timeout(30));
        assert_eq!(
            InvocationFailure::from(err),
            InvocationFailure::Timeout(Duration::from_secs(30))
        );
    }

    #[test]
    fn everything_else_is_remote_failure() {
        let err = anyhow::Error::from(ProviderError::AuthenticationFailed("bad key".into()));
        let failure = InvocationFailure::from(err);
        assert!(matches!(failure, InvocationFailure::RemoteFailure(ref m) if m.contains("bad key")));

        let failure = InvocationFailure::from(anyhow::anyhow!("connection reset"));
        assert!(matches!(failure, InvocationFailure::RemoteFailure(_)));
    }
}
