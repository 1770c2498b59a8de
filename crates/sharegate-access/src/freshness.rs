//! List freshness for conditional polling.

use sharegate_core::UserId;
use sharegate_store::{Store, VisibleSession};

use crate::error::Result;
use crate::listing::{ListView, ListingEngine};

/// Latest change across a set of visible rows, in Unix ms.
///
/// Counts each session's `updated_at` and the creation time of every share
/// through which it is visible. Zero for an empty set. Rows that left the
/// set are not seen here; [`FreshnessClock`] covers those.
pub fn last_modified<'a, I>(rows: I) -> i64
where
    I: IntoIterator<Item = &'a VisibleSession>,
{
    rows.into_iter()
        .map(|row| row.session.updated_at.max(row.grant.created_at))
        .max()
        .unwrap_or(0)
}

/// Render a timestamp as a strong entity tag.
pub fn etag(last_modified: i64) -> String {
    format!("\"{}\"", last_modified)
}

/// Single "last modified" clock over a viewer's visible set.
///
/// The value is the newest visible row folded with the store's visibility
/// stamp, so a list that only shrank still reads as changed.
pub struct FreshnessClock<'a, S: Store + ?Sized> {
    listing: &'a ListingEngine<'a, S>,
}

impl<'a, S: Store + ?Sized> FreshnessClock<'a, S> {
    pub fn new(listing: &'a ListingEngine<'a, S>) -> Self {
        Self { listing }
    }

    /// When anything in the view last changed.
    pub async fn list_last_modified(
        &self,
        viewer_id: UserId,
        view: ListView,
        now: i64,
    ) -> Result<i64> {
        let rows = self.listing.visible_rows(viewer_id, view, now).await?;
        let removed_at = self.listing.store().visibility_changed_at(now).await?;
        Ok(last_modified(&rows).max(removed_at))
    }
}
