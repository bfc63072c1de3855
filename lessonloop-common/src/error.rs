//! Common error types for LessonLoop

use thiserror::Error;

/// Common result type for LessonLoop operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across LessonLoop microservices
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested lesson (or other resource) not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Lesson is not in a state that permits the requested transition
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Decline was requested without a reason
    #[error("Missing decline reason: {0}")]
    MissingDeclineReason(String),

    /// Credit ledger call failed; the decline itself stands and the
    /// refund intent remains queued for reconciliation
    #[error("Compensation failed: {0}")]
    CompensationFailed(String),

    /// Notification dispatch failed; never affects the state transition
    #[error("Notification failed: {0}")]
    NotificationFailed(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
