//! Strong identifier types.
//!
//! All identifiers are newtypes to prevent misuse at compile time. Session and
//! share ids are opaque random bytes rendered as hex; user ids are the integer
//! keys handed out by the identity provider.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Length in bytes of session and share identifiers.
pub const ID_LEN: usize = 16;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(into = "String", try_from = "String")]
        pub struct $name(pub [u8; ID_LEN]);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                let mut bytes = [0u8; ID_LEN];
                rand::thread_rng().fill_bytes(&mut bytes);
                Self(bytes)
            }

            /// Create from raw bytes.
            pub const fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
                Self(bytes)
            }

            /// Get the raw bytes.
            pub const fn as_bytes(&self) -> &[u8; ID_LEN] {
                &self.0
            }

            /// Convert to hex string.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from hex string.
            ///
            /// Anything that is not exactly `2 * ID_LEN` hex digits is rejected.
            pub fn from_hex(s: &str) -> Result<Self, CoreError> {
                let bytes = hex::decode(s.trim())
                    .map_err(|_| CoreError::InvalidId(format!("{}: {:?}", $label, s)))?;
                let arr: [u8; ID_LEN] = bytes
                    .try_into()
                    .map_err(|_| CoreError::InvalidId(format!("{}: {:?}", $label, s)))?;
                Ok(Self(arr))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.to_hex()
            }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::from_hex(&s)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = CoreError;

            fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
                let arr: [u8; ID_LEN] = slice
                    .try_into()
                    .map_err(|_| CoreError::InvalidId(format!("{}: {} bytes", $label, slice.len())))?;
                Ok(Self(arr))
            }
        }
    };
}

opaque_id!(
    /// Primary key of a session. Never reused after deletion.
    SessionId,
    "session id"
);

opaque_id!(
    /// Primary key of a share.
    ShareId,
    "share id"
);

/// A user identifier as issued by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Get current time in milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_hex_roundtrip() {
        let id = SessionId::from_bytes([0x42; ID_LEN]);
        let recovered = SessionId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_malformed_ids_rejected() {
        assert!(SessionId::from_hex("not-hex").is_err());
        assert!(SessionId::from_hex("abcd").is_err());
        assert!(ShareId::from_hex("").is_err());
        assert!("zz".parse::<ShareId>().is_err());
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(ShareId::generate(), ShareId::generate());
    }

    #[test]
    fn test_id_serializes_as_hex_string() {
        let id = ShareId::from_bytes([0xab; ID_LEN]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(ID_LEN)));
        let back: ShareId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_user_id_is_transparent() {
        assert_eq!(serde_json::to_string(&UserId(7)).unwrap(), "7");
    }
}
