//! # Sharegate Store
//!
//! Storage abstraction for sharegate. Provides a trait-based interface for
//! users, sessions, and shares with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store module abstracts persistence behind the [`Store`] trait, keeping
//! the access layer storage-agnostic. The primary implementation is
//! [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`VisibleSession`] - A session together with one path that reaches it
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sharegate_core::{NewShare, Session};
//! use sharegate_store::{SqliteStore, Store};
//!
//! async fn example() {
//!     let store = SqliteStore::open("sharegate.db").unwrap();
//!
//!     let alice = store.create_user("alice@example.com", None, 0).await.unwrap();
//!     let session = Session::new(alice.id, "ext-1", 0);
//!     store.upsert_session(&session).await.unwrap();
//!
//!     let share = store
//!         .create_share(&session.id, alice.id, &NewShare::Public, None, 1)
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Side tables**: each share kind lives in its own table keyed by share id
//! - **Cascades**: deleting a session removes its shares, side rows and links
//! - **Lazy invites**: registering a user binds pending recipient rows by email

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{validate_expiry, validate_new_share, Store, VisibleSession};
