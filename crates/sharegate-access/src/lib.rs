//! # Sharegate Access
//!
//! Who may see a session, what they see, and how lists of sessions are built.
//!
//! ## Overview
//!
//! Everything here is read-side logic layered over a [`sharegate_store::Store`].
//! Resolution of a single session and the listing query share one precedence
//! rule ([`sharegate_core::strongest_grant`]), so the access level shown on a
//! list row always equals what opening that session would resolve to.
//!
//! ## Key Types
//!
//! - [`AccessResolver`] - `(session, viewer?) -> AccessInfo`, plus the guarded
//!   single-session read
//! - [`AccessPolicy`] - operator switches (share-all mode)
//! - [`ListingEngine`] - deduplicated, filtered, paginated lists with facets
//! - [`FreshnessClock`] - last-modified time of a viewer's visible set
//!
//! ## Redaction
//!
//! Owner-only fields are stripped in [`redact`]; every projection that leaves
//! this crate goes through it.

pub mod error;
pub mod freshness;
pub mod listing;
pub mod redact;
pub mod resolver;

pub use error::{AccessError, Result};
pub use freshness::{etag, last_modified, FreshnessClock};
pub use listing::{
    ids_are_unique, paginate, FilterFacets, ListFilters, ListRequest, ListView, ListingEngine, PageLimits,
    SessionPage, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use redact::{redact_detail, redact_list_item};
pub use resolver::{resolve_with_shares, AccessPolicy, AccessResolver};
