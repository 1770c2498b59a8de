//! # Sharegate
//!
//! Session sharing gateway: who can see a session, what they see, and how
//! lists of sessions are built.
//!
//! ## Overview
//!
//! A session belongs to one owner. The owner can open it up through shares:
//!
//! - **Recipient**: specific email addresses, bound to users as they sign up
//! - **System**: any authenticated user
//! - **Public**: anyone holding the link
//!
//! When a viewer reaches a session through several shares the strongest wins,
//! in the order `owner > recipient > system > public`. Anyone but the owner
//! sees the session with machine details (hostname, username, working
//! directory, transcript path) removed.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sharegate::{Gateway, GatewayConfig, NewShare};
//! use sharegate::core::Session;
//!
//! async fn example() {
//!     let gateway = Gateway::open(GatewayConfig::default()).unwrap();
//!
//!     let alice = gateway.create_user("alice@example.com", None).await.unwrap();
//!     let mut session = Session::new(alice.id, "ext-1", 0);
//!     session.total_lines = 120;
//!     let session = gateway.upsert_session(session).await.unwrap();
//!
//!     let id = session.id.to_hex();
//!     gateway
//!         .create_share(&id, alice.id, NewShare::Public, None)
//!         .await
//!         .unwrap();
//!
//!     // Anyone with the link can now read it, redacted.
//!     let (detail, access) = gateway.get_session_with_access(&id, None).await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `sharegate::core` - Core types (Session, Share, AccessType, etc.)
//! - `sharegate::store` - Storage abstraction and SQLite
//! - `sharegate::access` - Resolution, redaction and listing

pub mod config;
pub mod error;
pub mod gateway;

// Re-export component crates
pub use sharegate_access as access;
pub use sharegate_core as core;
pub use sharegate_store as store;

// Re-export main types for convenience
pub use config::{GatewayConfig, SHARE_ALL_ENV};
pub use error::{ErrorKind, GatewayError, Result};
pub use gateway::{Clock, Gateway};

// Re-export commonly used types
pub use sharegate_access::{
    etag, FilterFacets, ListFilters, ListRequest, ListView, SessionPage,
};
pub use sharegate_core::{
    AccessInfo, AccessType, GithubLink, NewShare, Session, SessionDetail, SessionId,
    SessionListItem, Share, ShareId, ShareKind, ShareWithSession, User, UserId, UserStatus,
};
