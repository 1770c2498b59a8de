//! Error types for the Gateway.

use sharegate_access::AccessError;
use sharegate_store::StoreError;
use thiserror::Error;

/// Coarse classification for the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Unauthorized,
    OwnerInactive,
    InvalidInput,
    Internal,
}

/// Errors that can occur during Gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing, or present but invisible to the viewer. The two are never
    /// distinguished.
    #[error("not found")]
    NotFound {
        /// An anonymous viewer could gain access by logging in.
        auth_may_help: bool,
    },

    /// The resource exists and belongs to someone else.
    #[error("forbidden")]
    Forbidden,

    /// The caller may not mutate this resource.
    #[error("unauthorized")]
    Unauthorized,

    /// The session's owner has been deactivated.
    #[error("session owner is inactive")]
    OwnerInactive,

    /// Caller-supplied data was rejected.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(StoreError),
}

impl GatewayError {
    pub(crate) fn not_found() -> Self {
        GatewayError::NotFound {
            auth_may_help: false,
        }
    }

    /// Classification for the transport layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::NotFound { .. } => ErrorKind::NotFound,
            GatewayError::Forbidden => ErrorKind::Forbidden,
            GatewayError::Unauthorized => ErrorKind::Unauthorized,
            GatewayError::OwnerInactive => ErrorKind::OwnerInactive,
            GatewayError::InvalidInput(_) => ErrorKind::InvalidInput,
            GatewayError::Store(_) => ErrorKind::Internal,
        }
    }

    /// Whether logging in could turn this error into a success.
    pub fn auth_may_help(&self) -> bool {
        matches!(self, GatewayError::NotFound { auth_may_help: true })
    }
}

impl From<StoreError> for GatewayError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SessionNotFound(_) | StoreError::UserNotFound(_) => {
                GatewayError::not_found()
            }
            StoreError::Unauthorized => GatewayError::Unauthorized,
            StoreError::InvalidInput(msg) => GatewayError::InvalidInput(msg),
            StoreError::Core(e) => GatewayError::InvalidInput(e.to_string()),
            other => GatewayError::Store(other),
        }
    }
}

impl From<AccessError> for GatewayError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::SessionNotFound(_) => GatewayError::not_found(),
            AccessError::Denied { auth_may_help } => GatewayError::NotFound { auth_may_help },
            AccessError::OwnerInactive => GatewayError::OwnerInactive,
            AccessError::Store(e) => e.into(),
        }
    }
}

/// Result type for Gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use sharegate_core::{SessionId, ID_LEN};

    #[test]
    fn test_denied_and_missing_look_alike() {
        let missing: GatewayError =
            AccessError::SessionNotFound(SessionId::from_bytes([0; ID_LEN])).into();
        let denied: GatewayError = AccessError::Denied {
            auth_may_help: false,
        }
        .into();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
        assert_eq!(denied.kind(), ErrorKind::NotFound);
        assert_eq!(missing.to_string(), denied.to_string());
    }

    #[test]
    fn test_auth_may_help_survives_mapping() {
        let e: GatewayError = AccessError::Denied {
            auth_may_help: true,
        }
        .into();
        assert!(e.auth_may_help());
    }

    #[test]
    fn test_store_mapping() {
        assert_eq!(
            GatewayError::from(StoreError::Unauthorized).kind(),
            ErrorKind::Unauthorized
        );
        assert_eq!(
            GatewayError::from(StoreError::InvalidInput("x".into())).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            GatewayError::from(StoreError::Migration("x".into())).kind(),
            ErrorKind::Internal
        );
    }
}
