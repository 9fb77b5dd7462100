//! Error types for the document Q&A pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Corrupt, unreadable or wrong-format upload
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Upload exceeds the configured size limit
    #[error("Document too large: {size} bytes (limit {limit} bytes)")]
    DocumentTooLarge { size: u64, limit: u64 },

    /// Document yielded no extractable text
    #[error("Document contains no extractable text")]
    EmptyDocument,

    /// Malformed query (empty question, top_k out of bounds)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Document has never been indexed
    #[error("Document not found: {0}")]
    DocumentNotFound(Uuid),

    /// Embedding backend unreachable or misbehaving
    #[error("Embedding backend error: {0}")]
    Embedding(String),

    /// Vector store unreachable or misbehaving
    #[error("Vector index unavailable: {0}")]
    VectorDb(String),

    /// Text generation backend unreachable or misbehaving
    #[error("Generation backend error: {0}")]
    Llm(String),

    /// Flow exceeded its wall-clock budget
    #[error("{flow} flow timed out after {}ms", budget.as_millis())]
    Timeout { flow: &'static str, budget: Duration },

    /// Embedding cache storage error
    #[error("Embedding cache error: {0}")]
    Cache(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Outcome code reported when a flow ends in `Failed(reason)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    InvalidFormat,
    Oversized,
    EmptyAfterExtraction,
    InvalidQuery,
    DocumentNotFound,
    EncodingBackendError,
    IndexUnavailable,
    GenerationBackendError,
    Timeout,
    Internal,
}

impl FailureReason {
    /// Wire name of the reason
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidFormat => "invalid-format",
            Self::Oversized => "oversized",
            Self::EmptyAfterExtraction => "empty-after-extraction",
            Self::InvalidQuery => "invalid-query",
            Self::DocumentNotFound => "document-not-found",
            Self::EncodingBackendError => "encoding-backend-error",
            Self::IndexUnavailable => "index-unavailable",
            Self::GenerationBackendError => "generation-backend-error",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        }
    }

    /// Input errors are never worth retrying
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidFormat | Self::Oversized | Self::EmptyAfterExtraction | Self::InvalidQuery
        )
    }

    /// Backend errors may succeed on a caller-level retry
    pub fn is_backend_error(&self) -> bool {
        matches!(
            self,
            Self::EncodingBackendError | Self::IndexUnavailable | Self::GenerationBackendError
        )
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Create an invalid document error
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument(message.into())
    }

    /// Create an invalid query error
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a vector db error
    pub fn vector_db(message: impl Into<String>) -> Self {
        Self::VectorDb(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Outcome code for this error
    pub fn reason(&self) -> FailureReason {
        match self {
            Error::InvalidDocument(_) => FailureReason::InvalidFormat,
            Error::DocumentTooLarge { .. } => FailureReason::Oversized,
            Error::EmptyDocument => FailureReason::EmptyAfterExtraction,
            Error::InvalidQuery(_) => FailureReason::InvalidQuery,
            Error::DocumentNotFound(_) => FailureReason::DocumentNotFound,
            Error::Embedding(_) => FailureReason::EncodingBackendError,
            Error::VectorDb(_) => FailureReason::IndexUnavailable,
            Error::Llm(_) => FailureReason::GenerationBackendError,
            Error::Timeout { .. } => FailureReason::Timeout,
            Error::Config(_)
            | Error::Cache(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Internal(_) => FailureReason::Internal,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self.reason() {
            FailureReason::InvalidFormat
            | FailureReason::EmptyAfterExtraction
            | FailureReason::InvalidQuery => StatusCode::BAD_REQUEST,
            FailureReason::Oversized => StatusCode::PAYLOAD_TOO_LARGE,
            FailureReason::DocumentNotFound => StatusCode::NOT_FOUND,
            FailureReason::EncodingBackendError | FailureReason::GenerationBackendError => {
                StatusCode::BAD_GATEWAY
            }
            FailureReason::IndexUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            FailureReason::Timeout => StatusCode::GATEWAY_TIMEOUT,
            FailureReason::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Cache(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let reason = self.reason();

        let error_type = match &self {
            Error::Config(_) => "config_error",
            Error::InvalidDocument(_) => "invalid_document",
            Error::DocumentTooLarge { .. } => "document_too_large",
            Error::EmptyDocument => "empty_document",
            Error::InvalidQuery(_) => "invalid_query",
            Error::DocumentNotFound(_) => "not_found",
            Error::Embedding(_) => "embedding_error",
            Error::VectorDb(_) => "vector_db_error",
            Error::Llm(_) => "llm_error",
            Error::Timeout { .. } => "timeout",
            Error::Cache(_) => "cache_error",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
            Error::Internal(_) => "internal_error",
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "reason": reason,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_mapping() {
        assert_eq!(Error::EmptyDocument.reason(), FailureReason::EmptyAfterExtraction);
        assert_eq!(
            Error::DocumentTooLarge { size: 10, limit: 5 }.reason(),
            FailureReason::Oversized
        );
        assert_eq!(Error::vector_db("down").reason(), FailureReason::IndexUnavailable);
        assert_eq!(
            Error::Timeout { flow: "query", budget: Duration::from_secs(1) }.reason(),
            FailureReason::Timeout
        );
        assert!(FailureReason::InvalidQuery.is_input_error());
        assert!(FailureReason::GenerationBackendError.is_backend_error());
    }

    #[test]
    fn test_reason_wire_name() {
        let json = serde_json::to_string(&FailureReason::DocumentNotFound).unwrap();
        assert_eq!(json, "\"document-not-found\"");
        assert_eq!(FailureReason::EncodingBackendError.to_string(), "encoding-backend-error");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::DocumentNotFound(Uuid::nil()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::llm("boom").into_response().status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
