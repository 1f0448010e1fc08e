//! Error types for media-dl
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (job state machine, artifact retrieval)
//! - HTTP status code mapping for whichever API layer fronts the engine
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{FailureKind, JobId, Status};

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
///
/// Every failure reachable from the public API maps to exactly one variant.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed request (bad URL, empty batch, too many items)
    #[error("validation error: {0}")]
    Validation(String),

    /// Generic resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Job registry error
    #[error("job error: {0}")]
    Job(#[from] JobError),

    /// Artifact retrieval error
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// Content is private or restricted
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Collaborator could not extract the media
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Operation stopped by a cancel request
    #[error("operation cancelled")]
    Cancelled,

    /// Operation exceeded its time limit
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Client exceeded its request quota
    #[error("rate limit exceeded for '{key}', retry in {retry_after_secs}s")]
    RateLimitExceeded {
        /// Client key the limit applies to
        key: String,
        /// Seconds until the current window ends
        retry_after_secs: u64,
    },

    /// Broken invariant or unexpected fault
    #[error("internal error: {0}")]
    Internal(String),

    /// Invalid configuration value
    #[error("configuration error: {message}")]
    Config {
        /// What is wrong with the value
        message: String,
        /// Offending key (e.g., "max_concurrent_jobs")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The engine no longer accepts work
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,
}

/// Job registry errors
#[derive(Debug, Error)]
pub enum JobError {
    /// No job with this id is tracked
    #[error("job {id} not found")]
    NotFound {
        /// The job id that was not found
        id: JobId,
    },

    /// Cancel requested for a job that already finished
    #[error("job {id} cannot be cancelled in status {status}")]
    NotCancelable {
        /// The job id
        id: JobId,
        /// Current status
        status: Status,
    },

    /// Attempted a transition that is not an edge of the state machine
    #[error("job {id}: illegal transition {from} -> {to}")]
    InvalidTransition {
        /// The job id
        id: JobId,
        /// Current status
        from: Status,
        /// Requested status
        to: Status,
    },
}

/// Artifact retrieval errors
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Unknown filename, or a filename that does not name a stored artifact
    #[error("file '{filename}' not found")]
    NotFound {
        /// Requested filename
        filename: String,
    },

    /// The artifact existed but its retrieval window has passed
    #[error("file '{filename}' has expired")]
    Expired {
        /// Requested filename
        filename: String,
    },
}

impl Error {
    /// Failure kind recorded on a job when this error terminates it
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::NotFound(_)
            | Error::Job(JobError::NotFound { .. })
            | Error::Artifact(_) => FailureKind::NotFound,
            Error::Forbidden(_) => FailureKind::Forbidden,
            Error::Extraction(_) => FailureKind::Unsupported,
            Error::Cancelled => FailureKind::Cancelled,
            Error::Timeout(_) => FailureKind::Timeout,
            _ => FailureKind::Internal,
        }
    }
}

/// API error response format
///
/// Standard format with a machine-readable code, a human-readable message
/// and optional contextual details.
///
/// ```json
/// {
///   "error": {
///     "code": "rate_limited",
///     "message": "rate limit exceeded for '10.0.0.1', retry in 42s",
///     "details": { "key": "10.0.0.1", "retry_after_secs": 42 }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Body of an [`ApiError`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable code (`job_not_found`, `rate_limited`, ...)
    pub code: String,

    /// Display text of the error
    pub message: String,

    /// Structured context, such as the job id or retry delay
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Error body without details
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Error body carrying structured details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// `validation_error` body
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }
}

/// HTTP status and code for an error, for whichever layer serves the engine
pub trait ToHttpStatus {
    /// HTTP status code
    fn status_code(&self) -> u16;

    /// Stable machine-readable code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Error::Validation(_) => 400,
            Error::Config { .. } => 400,

            // 403 Forbidden
            Error::Forbidden(_) => 403,

            // 404 Not Found
            Error::NotFound(_) => 404,
            Error::Job(JobError::NotFound { .. }) => 404,
            Error::Artifact(ArtifactError::NotFound { .. }) => 404,

            // 409 Conflict
            Error::Job(JobError::NotCancelable { .. }) => 409,
            Error::Job(JobError::InvalidTransition { .. }) => 409,
            Error::Cancelled => 409,

            // 410 Gone
            Error::Artifact(ArtifactError::Expired { .. }) => 410,

            // 422 Unprocessable Entity
            Error::Extraction(_) => 422,

            // 429 Too Many Requests
            Error::RateLimitExceeded { .. } => 429,

            // 500 Internal Server Error
            Error::Internal(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,

            // 504 Gateway Timeout
            Error::Timeout(_) => 504,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::NotFound(_) => "not_found",
            Error::Job(e) => match e {
                JobError::NotFound { .. } => "job_not_found",
                JobError::NotCancelable { .. } => "not_cancelable",
                JobError::InvalidTransition { .. } => "invalid_transition",
            },
            Error::Artifact(e) => match e {
                ArtifactError::NotFound { .. } => "file_not_found",
                ArtifactError::Expired { .. } => "file_expired",
            },
            Error::Forbidden(_) => "forbidden",
            Error::Extraction(_) => "extraction_failed",
            Error::Cancelled => "cancelled",
            Error::Timeout(_) => "timeout",
            Error::RateLimitExceeded { .. } => "rate_limited",
            Error::Internal(_) => "internal_error",
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ShuttingDown => "shutting_down",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Job(JobError::NotFound { id }) => Some(serde_json::json!({
                "job_id": id,
            })),
            Error::Job(JobError::NotCancelable { id, status }) => Some(serde_json::json!({
                "job_id": id,
                "status": status,
            })),
            Error::Job(JobError::InvalidTransition { id, from, to }) => {
                Some(serde_json::json!({
                    "job_id": id,
                    "from": from,
                    "to": to,
                }))
            }
            Error::Artifact(ArtifactError::NotFound { filename })
            | Error::Artifact(ArtifactError::Expired { filename }) => Some(serde_json::json!({
                "filename": filename,
            })),
            Error::RateLimitExceeded {
                key,
                retry_after_secs,
            } => Some(serde_json::json!({
                "key": key,
                "retry_after_secs": retry_after_secs,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        match details {
            Some(details) => ApiError::with_details(code, message, details),
            None => ApiError::new(code, message),
        }
    }
}
