//! Error types for memory-wall

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    /// Caller lacks accepted membership of the group that owns the resource
    #[error("Not a member: {0}")]
    NotMember(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Role-gated action attempted without the required role
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Lock contention or pool exhaustion; safe to retry
    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FeedError {
    /// Stable error kind exposed to clients
    pub fn kind(&self) -> &'static str {
        match self {
            FeedError::NotMember(_) => "NOT_MEMBER",
            FeedError::NotFound(_) => "NOT_FOUND",
            FeedError::Validation(_) | FeedError::Json(_) => "VALIDATION_ERROR",
            FeedError::Conflict(_) => "CONFLICT",
            FeedError::Forbidden(_) => "FORBIDDEN",
            FeedError::Transient(_) => "TRANSIENT",
            FeedError::Database(_)
            | FeedError::Config(_)
            | FeedError::Io(_)
            | FeedError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Human-readable message safe to return to a client.
    ///
    /// Internal variants collapse to a generic message; callers log the detail.
    pub fn public_message(&self) -> String {
        match self {
            FeedError::NotMember(msg)
            | FeedError::NotFound(msg)
            | FeedError::Validation(msg)
            | FeedError::Conflict(msg)
            | FeedError::Forbidden(msg) => msg.clone(),
            FeedError::Json(e) => format!("Malformed JSON: {}", e),
            FeedError::Transient(_) => "Temporarily unavailable, please retry".to_string(),
            _ => "An unexpected error occurred".to_string(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FeedError::Transient(_))
    }
}

impl From<DieselError> for FeedError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::NotFound => FeedError::NotFound("Record not found".into()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                FeedError::Conflict(info.message().to_string())
            }
            DieselError::DatabaseError(_, ref info) if is_lock_contention(info.message()) => {
                FeedError::Transient(info.message().to_string())
            }
            other => FeedError::Database(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for FeedError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        FeedError::Transient(format!("Failed to get connection: {}", e))
    }
}

fn is_lock_contention(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("database is locked") || lower.contains("database is busy")
}
