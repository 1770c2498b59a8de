//! Error types for the access module.

use sharegate_core::SessionId;
use sharegate_store::StoreError;
use thiserror::Error;

/// Errors that can occur while resolving or serving access.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The session does not exist.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// The session exists but the viewer has no access to it.
    ///
    /// Callers must present this exactly like `SessionNotFound`.
    #[error("no access")]
    Denied {
        /// Logging in could grant access.
        auth_may_help: bool,
    },

    /// The session's owner has been deactivated.
    #[error("session owner is inactive")]
    OwnerInactive,

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for access operations.
pub type Result<T> = std::result::Result<T, AccessError>;
