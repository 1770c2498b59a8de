//! # Sharegate Core
//!
//! Pure types for session sharing: identifiers, sessions, shares, access
//! levels, and list cursors.
//!
//! This crate contains no I/O and no storage. Everything here is plain data
//! plus the small amount of logic every layer above needs to agree on.
//!
//! ## Key Types
//!
//! - [`AccessType`] - Access level, ordered by precedence
//! - [`AccessInfo`] - Outcome of resolving a viewer against a session
//! - [`Share`] / [`ShareKind`] - A grant of access (public, system, recipient)
//! - [`Session`] - A stored session, PII included
//! - [`SessionDetail`] / [`SessionListItem`] - Redacted viewer projections
//! - [`ListCursor`] - Opaque keyset pagination position
//!
//! ## Precedence
//!
//! When a viewer reaches a session through several paths, the winner is
//! decided by [`access::strongest_grant`]. Resolution and listing both use it,
//! so the two can never disagree.

pub mod access;
pub mod cursor;
pub mod email;
pub mod error;
pub mod session;
pub mod share;
pub mod types;

pub use access::{strongest_grant, AccessGrant, AccessInfo, AccessType};
pub use cursor::ListCursor;
pub use email::{dedup_recipients, emails_match, normalize_email, validate_email};
pub use error::{CoreError, Result};
pub use session::{
    extract_repo_name, GitInfo, GithubLink, Session, SessionDetail, SessionListItem, User,
    UserStatus,
};
pub use share::{NewShare, Recipient, Share, ShareKind, ShareWithSession, Viewer};
pub use types::{now_millis, SessionId, ShareId, UserId, ID_LEN};
