//! Error taxonomy for the evaluation pipeline.
//!
//! Every error that can terminate an execution maps to exactly one
//! [`ErrorKind`], which is what gets persisted onto the `Execution` record
//! and published in the completion event. `CoreError` is the propagation
//! type used internally; it always knows its kind.

use serde::{Deserialize, Serialize};

/// Closed taxonomy of reasons an execution can fail.
///
/// Serializes in `SCREAMING_SNAKE_CASE` to match the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ValidationError,
    GenerationError,
    RuntimeError,
    Timeout,
    Cancelled,
    ParseError,
    InfrastructureError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::GenerationError => "GENERATION_ERROR",
            ErrorKind::RuntimeError => "RUNTIME_ERROR",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Cancelled => "CANCELLED",
            ErrorKind::ParseError => "PARSE_ERROR",
            ErrorKind::InfrastructureError => "INFRASTRUCTURE_ERROR",
        };
        f.write_str(s)
    }
}

/// Specific invariant violated by the doctest parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Parser's derived total didn't match `len(requested_test_ids)`.
    TestCountMismatch,
    /// Parser's derived (passed, failed) didn't match the summary line.
    ResultMismatch,
    /// A failure marker referenced a test header not in the request.
    UnknownTestCase,
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParseErrorKind::TestCountMismatch => "test_count_mismatch",
            ParseErrorKind::ResultMismatch => "result_mismatch",
            ParseErrorKind::UnknownTestCase => "unknown_test_case",
        };
        f.write_str(s)
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

/// The error type threaded through the pipeline.
///
/// Every variant maps to one [`ErrorKind`] via [`CoreError::kind`], which is
/// what the Coordinator writes onto the `Execution` row.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("harness generation failed: {0}")]
    Generation(String),

    #[error("submission terminated abnormally: {stderr}")]
    Runtime { stderr: String },

    #[error("execution exceeded the configured timeout")]
    Timeout,

    #[error("execution was cancelled")]
    Cancelled,

    #[error("doctest output violated {kind}: {detail}")]
    Parse {
        kind: ParseErrorKind,
        detail: String,
    },

    #[error("infrastructure failure: {0}")]
    Infrastructure(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::ValidationError,
            CoreError::Generation(_) => ErrorKind::GenerationError,
            CoreError::Runtime { .. } => ErrorKind::RuntimeError,
            CoreError::Timeout => ErrorKind::Timeout,
            CoreError::Cancelled => ErrorKind::Cancelled,
            CoreError::Parse { .. } => ErrorKind::ParseError,
            CoreError::Infrastructure(_) => ErrorKind::InfrastructureError,
        }
    }

    pub fn parse(kind: ParseErrorKind, detail: impl Into<String>) -> Self {
        CoreError::Parse {
            kind,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ValidationError).unwrap();
        assert_eq!(json, "\"VALIDATION_ERROR\"");
        let json = serde_json::to_string(&ErrorKind::InfrastructureError).unwrap();
        assert_eq!(json, "\"INFRASTRUCTURE_ERROR\"");
    }

    #[test]
    fn core_error_kind_mapping() {
        assert_eq!(CoreError::Timeout.kind(), ErrorKind::Timeout);
        assert_eq!(
            CoreError::parse(ParseErrorKind::TestCountMismatch, "x").kind(),
            ErrorKind::ParseError
        );
    }
}
