//! Store trait: the abstract interface for session and share persistence.
//!
//! This trait keeps the access layer storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use sharegate_core::{
    dedup_recipients, AccessGrant, GithubLink, NewShare, Session, SessionId, Share, ShareId,
    ShareWithSession, User, UserId, UserStatus, Viewer,
};

use crate::error::{Result, StoreError};

/// A session reachable by some viewer, with the path that reaches it.
///
/// Listing works on these rows: one per (session, access path). The same
/// session can appear several times; the caller collapses them by precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleSession {
    pub session: Session,
    pub owner_email: String,
    pub owner_status: UserStatus,
    pub grant: AccessGrant,
}

/// The Store trait: async interface for sharegate persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Time comes from the caller**: every method that compares against or
///   records "now" takes it as an argument.
/// - **Ownership checks live here**: share mutation verifies the owner in the
///   same transaction as the write.
/// - **Removals leave a stamp**: rows that stop being visible carry no
///   timestamp of their own, so every mutation that can hide a session
///   records when it happened. See [`Store::visibility_changed_at`].
/// - **Expiry is not filtered on management reads**: `list_shares` and
///   `shares_for_session` return expired rows; the access layer decides.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // User Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a user.
    ///
    /// Pending recipient rows whose email matches (case-insensitively) are
    /// bound to the new user id. A duplicate email is `InvalidInput`.
    async fn create_user(&self, email: &str, display_name: Option<&str>, now: i64)
        -> Result<User>;

    /// Get a user by id.
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    /// Get a user by email, case-insensitively.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Activate or deactivate a user.
    ///
    /// Moves the visibility stamp: the owner's shared sessions drop out of or
    /// come back into other users' lists.
    async fn set_user_status(&self, id: UserId, status: UserStatus, now: i64) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Session Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or replace a session, including its GitHub links.
    ///
    /// An id already stored under a different owner is `SessionNotFound`;
    /// ownership never moves.
    async fn upsert_session(&self, session: &Session) -> Result<()>;

    /// Get a session by id.
    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>>;

    /// Delete a session owned by `owner_id`, cascading to its shares.
    ///
    /// Returns `false` when nothing matched. A successful delete moves the
    /// visibility stamp.
    async fn delete_session(&self, id: &SessionId, owner_id: UserId, now: i64) -> Result<bool>;

    /// Record a completed sync: counters, activity time, and `updated_at`.
    async fn record_sync(
        &self,
        id: &SessionId,
        file_count: i64,
        total_lines: i64,
        last_activity_at: Option<i64>,
        now: i64,
    ) -> Result<()>;

    /// Link a pull request or commit. Linking the same artifact twice is a no-op.
    async fn add_github_link(&self, id: &SessionId, link: &GithubLink, now: i64) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Share Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a public or recipient share on a session owned by `owner_id`.
    ///
    /// Runs in one transaction. A missing or foreign session is
    /// `SessionNotFound`; see [`validate_new_share`] for input rules.
    async fn create_share(
        &self,
        session_id: &SessionId,
        owner_id: UserId,
        share: &NewShare,
        expires_at: Option<i64>,
        now: i64,
    ) -> Result<Share>;

    /// Create a system share. Privileged: no ownership check.
    async fn create_system_share(
        &self,
        session_id: &SessionId,
        expires_at: Option<i64>,
        now: i64,
    ) -> Result<Share>;

    /// Delete a share if `owner_id` owns its session; otherwise `Unauthorized`.
    ///
    /// Moves the visibility stamp in the same transaction as the delete.
    async fn revoke_share(&self, share_id: &ShareId, owner_id: UserId, now: i64) -> Result<()>;

    /// Get a share by id.
    async fn get_share(&self, share_id: &ShareId) -> Result<Option<Share>>;

    /// Shares of one owned session, newest first, expired included.
    async fn list_shares(&self, session_id: &SessionId, owner_id: UserId) -> Result<Vec<Share>>;

    /// Every share across the owner's sessions, newest first.
    async fn list_all_user_shares(&self, owner_id: UserId) -> Result<Vec<ShareWithSession>>;

    /// All shares on a session regardless of expiry. Order unspecified.
    async fn shares_for_session(&self, session_id: &SessionId) -> Result<Vec<Share>>;

    /// Stamp `last_accessed_at` on a share.
    async fn touch_share(&self, share_id: &ShareId, now: i64) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Listing Inputs
    // ─────────────────────────────────────────────────────────────────────────

    /// Sessions owned by `owner_id`, each with an owner grant.
    async fn owned_sessions(&self, owner_id: UserId) -> Result<Vec<VisibleSession>>;

    /// Sessions of other owners reachable through a valid recipient or system
    /// share. One row per applicable share.
    async fn shared_sessions(&self, viewer: &Viewer, now: i64) -> Result<Vec<VisibleSession>>;

    /// Every session not owned by `viewer_id`, with a synthetic system grant.
    async fn sessions_not_owned_by(&self, viewer_id: UserId) -> Result<Vec<VisibleSession>>;

    /// Latest moment a session may have dropped out of some list, in Unix ms.
    ///
    /// The greater of the visibility stamp (last revoke, session delete or
    /// user status change) and the latest share expiry at or before `now`.
    /// Zero when neither has happened. Never decreases as `now` advances.
    async fn visibility_changed_at(&self, now: i64) -> Result<i64>;
}

/// Reject an expiry that is not in the future.
pub fn validate_expiry(expires_at: Option<i64>, now: i64) -> Result<()> {
    match expires_at {
        Some(expires_at) if expires_at <= now => Err(StoreError::InvalidInput(
            "expiry must be in the future".into(),
        )),
        _ => Ok(()),
    }
}

/// Check a share request before it touches storage.
///
/// Returns the deduplicated recipient list (empty for public shares).
pub fn validate_new_share(
    share: &NewShare,
    expires_at: Option<i64>,
    now: i64,
) -> Result<Vec<String>> {
    validate_expiry(expires_at, now)?;
    match share {
        NewShare::Public => Ok(Vec::new()),
        NewShare::Recipients(emails) => {
            if emails.is_empty() {
                return Err(StoreError::InvalidInput(
                    "recipient share needs at least one email".into(),
                ));
            }
            dedup_recipients(emails).map_err(|e| StoreError::InvalidInput(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_past_expiry() {
        let err = validate_new_share(&NewShare::Public, Some(10), 10).unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
        assert!(validate_new_share(&NewShare::Public, Some(11), 10).is_ok());
    }

    #[test]
    fn test_validate_recipients() {
        assert!(validate_new_share(&NewShare::Recipients(vec![]), None, 0).is_err());
        assert!(validate_new_share(&NewShare::Recipients(vec!["nope".into()]), None, 0).is_err());
        let emails = validate_new_share(
            &NewShare::Recipients(vec!["A@x.com".into(), "a@X.com".into()]),
            None,
            0,
        )
        .unwrap();
        assert_eq!(emails, vec!["A@x.com".to_string()]);
    }
}
