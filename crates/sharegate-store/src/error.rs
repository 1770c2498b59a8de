//! Error types for the store module.

use sharegate_core::{CoreError, SessionId, UserId};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The session does not exist or is not owned by the caller.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// The user does not exist.
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// The caller may not perform this operation.
    ///
    /// Deliberately does not say whether the target exists.
    #[error("unauthorized")]
    Unauthorized,

    /// Caller-supplied data was rejected.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A stored value could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A core value failed to parse.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
