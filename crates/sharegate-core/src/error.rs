//! Error types for sharegate core.

use thiserror::Error;

/// Errors raised while parsing or validating core values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// An email address is malformed.
    #[error("invalid email address: {0:?}")]
    InvalidEmail(String),

    /// A list cursor could not be decoded.
    #[error("invalid cursor: {0}")]
    Cursor(String),

    /// An unknown enum label was read back from storage.
    #[error("unknown {kind} label: {label:?}")]
    UnknownLabel { kind: &'static str, label: String },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
