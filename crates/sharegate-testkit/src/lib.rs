//! # Sharegate Testkit
//!
//! Testing utilities for sharegate.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a gateway over a memory store with a controllable clock
//! - **Generators**: proptest strategies for share layouts and listable sessions
//!
//! ## Property Testing
//!
//! A [`ShareLayout`] carries its own expected outcome:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use sharegate_testkit::generators::{ShareLayout, NOW};
//!
//! proptest! {
//!     #[test]
//!     fn resolution_matches(layout: ShareLayout) {
//!         let session = layout.session();
//!         let shares = layout.build_shares(&session);
//!         // resolve and compare against layout.expected_access()
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use sharegate_testkit::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let alice = fixture.user("alice@example.com").await;
//! let session = fixture.session(alice.id, "ext-1").await;
//! fixture.public_share(&session).await;
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{multi_party_fixture, TestFixture, START_TIME};
pub use generators::{session_params, SessionParams, ShareLayout};
