//! Error types module
//!
//! All errors raised by the core domain are unified under the `AppError`
//! enum. `InvalidStateTransition` is reserved for programmer/workflow
//! mistakes and is never retried; expected business outcomes (duplicate
//! content, missing records, stale versions) have their own variants so
//! callers can match on the kind instead of parsing messages.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the
//! `sqlx` feature, matching how the persistence crate is wired in.

use std::io;

use crate::models::FileStatus;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: FileStatus, to: FileStatus },

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate content: {0}")]
    DuplicateContent(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("scan error: {0}")]
    Scan(String),

    #[cfg(feature = "sqlx")]
    #[error("database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("database error: {0}")]
    Database(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        match err {
            SqlxError::RowNotFound => AppError::NotFound("row not found".to_string()),
            other => AppError::Database(other),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl AppError {
    /// Get the error type name for log context
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::InvalidStateTransition { .. } => "InvalidStateTransition",
            AppError::PreconditionFailed(_) => "PreconditionFailed",
            AppError::NotFound(_) => "NotFound",
            AppError::DuplicateContent(_) => "DuplicateContent",
            AppError::Conflict(_) => "Conflict",
            AppError::Storage(_) => "Storage",
            AppError::Scan(_) => "Scan",
            AppError::Database(_) => "Database",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Whether retrying the failed operation can succeed.
    ///
    /// Transition and precondition violations are programmer errors and
    /// never become valid on retry; infrastructure failures may.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Storage(_)
                | AppError::Scan(_)
                | AppError::Database(_)
                | AppError::Internal(_)
                | AppError::InternalWithSource { .. }
        )
    }
}
