//! Session listing: visibility, dedup, filters, facets and pagination.
//!
//! A list request runs in four steps:
//!
//! 1. Gather every (session, access path) row the view allows.
//! 2. Drop rows that must not surface (inactive owners, empty sessions) and
//!    collapse the rest to one row per session by access precedence.
//! 3. Compute facets over that set, then apply filters.
//! 4. Sort newest first and cut a page after the cursor.
//!
//! Facets are taken before filtering so a client can change filters without
//! the options disappearing under it.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use sharegate_core::access::dedup_by_precedence;
use sharegate_core::{
    normalize_email, AccessType, ListCursor, SessionListItem, UserId, UserStatus,
};
use sharegate_store::{Store, StoreError, VisibleSession};

use crate::error::Result;
use crate::redact::redact_list_item;
use crate::resolver::{AccessPolicy, AccessResolver};

/// Page size used when the caller asks for 0.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Largest page a caller may ask for.
pub const MAX_PAGE_SIZE: usize = 200;

/// Which sessions a list covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListView {
    /// Only the viewer's own sessions.
    #[default]
    Owned,
    /// Owned sessions plus those shared with the viewer by recipient or
    /// system share. Public shares do not place a session here.
    SharedWithMe,
}

/// Filters on a list request.
///
/// Values within one field are OR'd; fields are AND'd. Empty fields are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListFilters {
    /// `org/repo` names.
    pub repos: Vec<String>,
    pub branches: Vec<String>,
    /// Owner emails, matched case-insensitively.
    pub owners: Vec<String>,
    /// Pull-request numbers.
    pub prs: Vec<String>,
    /// Free text: substring of any title, summary or first message, or a
    /// prefix of a linked commit SHA. Case-insensitive.
    pub query: Option<String>,
}

impl ListFilters {
    /// Whether `item` passes every filter.
    pub fn matches(&self, item: &SessionListItem) -> bool {
        if !self.repos.is_empty()
            && !item
                .git_repo
                .as_ref()
                .is_some_and(|repo| self.repos.contains(repo))
        {
            return false;
        }

        if !self.branches.is_empty()
            && !item
                .git_branch
                .as_ref()
                .is_some_and(|branch| self.branches.contains(branch))
        {
            return false;
        }

        if !self.owners.is_empty() {
            let owner = normalize_email(&item.owner_email);
            if !self.owners.iter().any(|o| normalize_email(o) == owner) {
                return false;
            }
        }

        if !self.prs.is_empty() && !item.github_prs.iter().any(|pr| self.prs.contains(pr)) {
            return false;
        }

        match self.query.as_deref().map(str::trim) {
            Some(query) if !query.is_empty() => matches_query(item, &query.to_lowercase()),
            _ => true,
        }
    }
}

fn matches_query(item: &SessionListItem, needle: &str) -> bool {
    let text_hit = [
        &item.custom_title,
        &item.suggested_title,
        &item.summary,
        &item.first_user_message,
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(needle));

    text_hit
        || item
            .github_commits
            .iter()
            .any(|sha| sha.to_lowercase().starts_with(needle))
}

/// Distinct filter values over the unfiltered visible set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterFacets {
    pub repos: Vec<String>,
    pub branches: Vec<String>,
    /// Lower-cased owner emails.
    pub owners: Vec<String>,
}

impl FilterFacets {
    /// Collect sorted, distinct facet values.
    pub fn collect<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a SessionListItem>,
    {
        let mut repos = BTreeSet::new();
        let mut branches = BTreeSet::new();
        let mut owners = BTreeSet::new();
        for item in items {
            if let Some(repo) = item.git_repo.as_ref().filter(|r| !r.is_empty()) {
                repos.insert(repo.clone());
            }
            if let Some(branch) = item.git_branch.as_ref().filter(|b| !b.is_empty()) {
                branches.insert(branch.clone());
            }
            owners.insert(normalize_email(&item.owner_email));
        }
        Self {
            repos: repos.into_iter().collect(),
            branches: branches.into_iter().collect(),
            owners: owners.into_iter().collect(),
        }
    }
}

/// A list request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListRequest {
    pub view: ListView,
    pub filters: ListFilters,
    /// Opaque cursor from a previous page.
    pub cursor: Option<String>,
    /// Requested page size; 0 means the default.
    pub page_size: usize,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPage {
    pub items: Vec<SessionListItem>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
    /// The page size actually applied.
    pub page_size: usize,
    pub filter_facets: FilterFacets,
}

/// Page size bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_size: usize,
    pub max_size: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_size: DEFAULT_PAGE_SIZE,
            max_size: MAX_PAGE_SIZE,
        }
    }
}

impl PageLimits {
    /// Apply the default and the cap to a requested size.
    pub fn clamp(&self, requested: usize) -> usize {
        let size = if requested == 0 {
            self.default_size
        } else {
            requested
        };
        size.clamp(1, self.max_size.max(1))
    }
}

/// Whether a row may surface in a list at all.
fn surfaces(row: &VisibleSession) -> bool {
    let owner_ok =
        row.grant.access_type == AccessType::Owner || row.owner_status == UserStatus::Active;
    owner_ok && row.session.is_materialized()
}

/// Sort newest first, id descending on ties, and cut one page.
///
/// `items` must already be deduplicated. An undecodable cursor yields an
/// empty page; only encoding the next cursor can fail.
pub fn paginate(
    mut items: Vec<SessionListItem>,
    cursor: Option<&str>,
    page_size: usize,
) -> sharegate_core::Result<(Vec<SessionListItem>, Option<String>, bool)> {
    items.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));

    let start = match cursor.filter(|c| !c.is_empty()) {
        None => 0,
        Some(raw) => match ListCursor::decode(raw) {
            Ok(cursor) => items
                .iter()
                .position(|item| cursor.precedes(item.sort_key()))
                .unwrap_or(items.len()),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring undecodable list cursor");
                return Ok((Vec::new(), None, false));
            }
        },
    };

    let mut page: Vec<SessionListItem> =
        items.into_iter().skip(start).take(page_size + 1).collect();
    let has_more = page.len() > page_size;
    page.truncate(page_size);

    let next_cursor = match page.last() {
        Some(item) if has_more => {
            let (sort_ts, session_id) = item.sort_key();
            Some(ListCursor::new(sort_ts, session_id).encode()?)
        }
        _ => None,
    };
    Ok((page, next_cursor, has_more))
}

/// Builds session lists from a [`Store`].
pub struct ListingEngine<'a, S: Store + ?Sized> {
    store: &'a S,
    policy: AccessPolicy,
    limits: PageLimits,
}

impl<'a, S: Store + ?Sized> ListingEngine<'a, S> {
    pub fn new(store: &'a S, policy: AccessPolicy, limits: PageLimits) -> Self {
        Self {
            store,
            policy,
            limits,
        }
    }

    /// The store rows are read from.
    pub fn store(&self) -> &'a S {
        self.store
    }

    /// Every (session, access path) row the view exposes to the viewer.
    ///
    /// Rows are filtered for visibility but not yet collapsed: a session
    /// reachable through several shares appears once per share.
    pub async fn visible_rows(
        &self,
        viewer_id: UserId,
        view: ListView,
        now: i64,
    ) -> Result<Vec<VisibleSession>> {
        let mut rows = self.store.owned_sessions(viewer_id).await?;

        if view == ListView::SharedWithMe {
            let resolver = AccessResolver::new(self.store, self.policy);
            if let Some(viewer) = resolver.viewer(Some(viewer_id)).await? {
                rows.extend(self.store.shared_sessions(&viewer, now).await?);
            }
            if self.policy.share_all_sessions {
                rows.extend(self.store.sessions_not_owned_by(viewer_id).await?);
            }
        }

        rows.retain(surfaces);
        Ok(rows)
    }

    /// One row per visible session, carrying its highest-precedence path.
    pub async fn visible_items(
        &self,
        viewer_id: UserId,
        view: ListView,
        now: i64,
    ) -> Result<Vec<SessionListItem>> {
        let rows = self.visible_rows(viewer_id, view, now).await?;
        let rows = dedup_by_precedence(rows, |r| r.session.id, |r| r.grant);
        Ok(rows.into_iter().map(redact_list_item).collect())
    }

    /// List sessions for `viewer_id`.
    pub async fn list(
        &self,
        viewer_id: UserId,
        request: &ListRequest,
        now: i64,
    ) -> Result<SessionPage> {
        let page_size = self.limits.clamp(request.page_size);
        let items = self.visible_items(viewer_id, request.view, now).await?;
        let filter_facets = FilterFacets::collect(&items);

        let filtered: Vec<SessionListItem> = items
            .into_iter()
            .filter(|item| request.filters.matches(item))
            .collect();
        let (items, next_cursor, has_more) =
            paginate(filtered, request.cursor.as_deref(), page_size)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;

        tracing::debug!(
            viewer = %viewer_id,
            view = ?request.view,
            returned = items.len(),
            has_more,
            "listed sessions"
        );

        Ok(SessionPage {
            items,
            next_cursor,
            has_more,
            page_size,
            filter_facets,
        })
    }
}

/// Check that no session id appears twice.
pub fn ids_are_unique(items: &[SessionListItem]) -> bool {
    let mut seen = HashSet::with_capacity(items.len());
    items.iter().all(|item| seen.insert(item.id))
}
