//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use sharegate_core::{
    emails_match, AccessGrant, AccessType, GithubLink, NewShare, Recipient, Session, SessionId,
    Share, ShareId, ShareKind, ShareWithSession, User, UserId, UserStatus, Viewer,
};

use crate::error::{Result, StoreError};
use crate::traits::{validate_expiry, validate_new_share, Store, VisibleSession};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

struct MemoryStoreInner {
    /// Users indexed by ID.
    users: BTreeMap<UserId, User>,

    /// Last user id handed out.
    last_user_id: i64,

    /// Sessions indexed by ID.
    sessions: HashMap<SessionId, Session>,

    /// Shares indexed by ID.
    shares: HashMap<ShareId, StoredShare>,

    /// Insertion counter; breaks created_at ties the way SQLite's rowid does.
    share_seq: u64,

    /// Last revoke, session delete or user status change.
    visibility_stamp: i64,
}

struct StoredShare {
    share: Share,
    seq: u64,
}

impl MemoryStoreInner {
    fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users.values().find(|u| emails_match(&u.email, email))
    }

    fn owned_session(&self, id: &SessionId, owner_id: UserId) -> Option<&Session> {
        self.sessions.get(id).filter(|s| s.owner_id == owner_id)
    }

    fn insert_share(&mut self, share: Share) {
        self.share_seq += 1;
        let seq = self.share_seq;
        self.shares.insert(share.id, StoredShare { share, seq });
    }

    /// Shares matching `pred`, newest first.
    fn shares_newest_first<F>(&self, pred: F) -> Vec<Share>
    where
        F: Fn(&Share) -> bool,
    {
        let mut stored: Vec<&StoredShare> =
            self.shares.values().filter(|s| pred(&s.share)).collect();
        stored.sort_by(|a, b| {
            (b.share.created_at, b.seq).cmp(&(a.share.created_at, a.seq))
        });
        stored.into_iter().map(|s| s.share.clone()).collect()
    }

    fn stamp_visibility(&mut self, now: i64) {
        self.visibility_stamp = self.visibility_stamp.max(now);
    }

    fn visible(&self, session: &Session, grant: AccessGrant) -> Option<VisibleSession> {
        let owner = self.users.get(&session.owner_id)?;
        Some(VisibleSession {
            session: session.clone(),
            owner_email: owner.email.clone(),
            owner_status: owner.status,
            grant,
        })
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                users: BTreeMap::new(),
                last_user_id: 0,
                sessions: HashMap::new(),
                shares: HashMap::new(),
                share_seq: 0,
                visibility_stamp: 0,
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(
        &self,
        email: &str,
        display_name: Option<&str>,
        now: i64,
    ) -> Result<User> {
        let mut inner = self.inner.write().unwrap();
        let email = email.trim().to_string();

        if inner.user_by_email(&email).is_some() {
            return Err(StoreError::InvalidInput(format!(
                "email already registered: {}",
                email
            )));
        }

        inner.last_user_id += 1;
        let user = User {
            id: UserId(inner.last_user_id),
            email,
            display_name: display_name.map(str::to_string),
            status: UserStatus::Active,
            created_at: now,
        };
        inner.users.insert(user.id, user.clone());

        let mut resolved = 0usize;
        for stored in inner.shares.values_mut() {
            if let ShareKind::Recipient(recipients) = &mut stored.share.kind {
                for r in recipients.iter_mut() {
                    if r.user_id.is_none() && emails_match(&r.email, &user.email) {
                        r.user_id = Some(user.id);
                        resolved += 1;
                    }
                }
            }
        }
        if resolved > 0 {
            tracing::debug!(user_id = %user.id, resolved, "bound pending invites to new user");
        }

        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.user_by_email(email).cloned())
    }

    async fn set_user_status(&self, id: UserId, status: UserStatus, now: i64) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        match inner.users.get_mut(&id) {
            Some(user) => user.status = status,
            None => return Err(StoreError::UserNotFound(id)),
        }
        inner.stamp_visibility(now);
        Ok(())
    }

    async fn upsert_session(&self, session: &Session) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if !inner.users.contains_key(&session.owner_id) {
            return Err(StoreError::UserNotFound(session.owner_id));
        }
        if let Some(existing) = inner.sessions.get(&session.id) {
            if existing.owner_id != session.owner_id {
                return Err(StoreError::SessionNotFound(session.id));
            }
        }
        let mut session = session.clone();
        // Same collapse as the links table's primary key: the oldest entry wins.
        dedup_in_place(&mut session.github_prs);
        session.github_commits.reverse();
        dedup_in_place(&mut session.github_commits);
        session.github_commits.reverse();
        inner.sessions.insert(session.id, session);
        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.sessions.get(id).cloned())
    }

    async fn delete_session(&self, id: &SessionId, owner_id: UserId, now: i64) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        if inner.owned_session(id, owner_id).is_none() {
            return Ok(false);
        }
        inner.sessions.remove(id);
        inner.shares.retain(|_, s| s.share.session_id != *id);
        inner.stamp_visibility(now);
        Ok(true)
    }

    async fn record_sync(
        &self,
        id: &SessionId,
        file_count: i64,
        total_lines: i64,
        last_activity_at: Option<i64>,
        now: i64,
    ) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let session = inner
            .sessions
            .get_mut(id)
            .ok_or(StoreError::SessionNotFound(*id))?;
        session.file_count = file_count;
        session.total_lines = total_lines;
        if last_activity_at.is_some() {
            session.last_activity_at = last_activity_at;
        }
        session.last_sync_at = Some(now);
        session.updated_at = now;
        Ok(())
    }

    async fn add_github_link(&self, id: &SessionId, link: &GithubLink, now: i64) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let session = inner
            .sessions
            .get_mut(id)
            .ok_or(StoreError::SessionNotFound(*id))?;

        let inserted = match link {
            GithubLink::PullRequest(pr) if !session.github_prs.contains(pr) => {
                session.github_prs.push(pr.clone());
                true
            }
            GithubLink::Commit(sha) if !session.github_commits.contains(sha) => {
                session.github_commits.insert(0, sha.clone());
                true
            }
            _ => false,
        };
        if inserted {
            session.updated_at = now;
        }
        Ok(())
    }

    async fn create_share(
        &self,
        session_id: &SessionId,
        owner_id: UserId,
        share: &NewShare,
        expires_at: Option<i64>,
        now: i64,
    ) -> Result<Share> {
        let emails = validate_new_share(share, expires_at, now)?;
        let mut inner = self.inner.write().unwrap();

        if inner.owned_session(session_id, owner_id).is_none() {
            return Err(StoreError::SessionNotFound(*session_id));
        }

        let kind = match share {
            NewShare::Public => ShareKind::Public,
            NewShare::Recipients(_) => ShareKind::Recipient(
                emails
                    .into_iter()
                    .map(|email| {
                        let user_id = inner.user_by_email(&email).map(|u| u.id);
                        Recipient { email, user_id }
                    })
                    .collect(),
            ),
        };

        let share = Share {
            id: ShareId::generate(),
            session_id: *session_id,
            kind,
            expires_at,
            created_at: now,
            last_accessed_at: None,
        };
        inner.insert_share(share.clone());
        Ok(share)
    }

    async fn create_system_share(
        &self,
        session_id: &SessionId,
        expires_at: Option<i64>,
        now: i64,
    ) -> Result<Share> {
        validate_expiry(expires_at, now)?;
        let mut inner = self.inner.write().unwrap();

        if !inner.sessions.contains_key(session_id) {
            return Err(StoreError::SessionNotFound(*session_id));
        }

        let share = Share {
            id: ShareId::generate(),
            session_id: *session_id,
            kind: ShareKind::System,
            expires_at,
            created_at: now,
            last_accessed_at: None,
        };
        inner.insert_share(share.clone());
        Ok(share)
    }

    async fn revoke_share(&self, share_id: &ShareId, owner_id: UserId, now: i64) -> Result<()> {
        let mut inner = self.inner.write().unwrap();

        let owns = inner
            .shares
            .get(share_id)
            .and_then(|s| inner.owned_session(&s.share.session_id, owner_id))
            .is_some();
        if !owns {
            return Err(StoreError::Unauthorized);
        }
        inner.shares.remove(share_id);
        inner.stamp_visibility(now);
        Ok(())
    }

    async fn get_share(&self, share_id: &ShareId) -> Result<Option<Share>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.shares.get(share_id).map(|s| s.share.clone()))
    }

    async fn list_shares(&self, session_id: &SessionId, owner_id: UserId) -> Result<Vec<Share>> {
        let inner = self.inner.read().unwrap();
        if inner.owned_session(session_id, owner_id).is_none() {
            return Err(StoreError::SessionNotFound(*session_id));
        }
        Ok(inner.shares_newest_first(|s| s.session_id == *session_id))
    }

    async fn list_all_user_shares(&self, owner_id: UserId) -> Result<Vec<ShareWithSession>> {
        let inner = self.inner.read().unwrap();
        let shares = inner.shares_newest_first(|s| {
            inner
                .owned_session(&s.session_id, owner_id)
                .is_some()
        });

        Ok(shares
            .into_iter()
            .filter_map(|share| {
                let session = inner.sessions.get(&share.session_id)?;
                Some(ShareWithSession {
                    external_id: session.external_id.clone(),
                    session_summary: session.summary.clone(),
                    session_first_user_message: session.first_user_message.clone(),
                    share,
                })
            })
            .collect())
    }

    async fn shares_for_session(&self, session_id: &SessionId) -> Result<Vec<Share>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .shares
            .values()
            .filter(|s| s.share.session_id == *session_id)
            .map(|s| s.share.clone())
            .collect())
    }

    async fn touch_share(&self, share_id: &ShareId, now: i64) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(stored) = inner.shares.get_mut(share_id) {
            stored.share.last_accessed_at = Some(now);
        }
        Ok(())
    }

    async fn owned_sessions(&self, owner_id: UserId) -> Result<Vec<VisibleSession>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .sessions
            .values()
            .filter(|s| s.owner_id == owner_id)
            .filter_map(|s| inner.visible(s, AccessGrant::owner()))
            .collect())
    }

    async fn shared_sessions(&self, viewer: &Viewer, now: i64) -> Result<Vec<VisibleSession>> {
        let inner = self.inner.read().unwrap();
        let mut out = Vec::new();

        for stored in inner.shares.values() {
            let share = &stored.share;
            if !share.is_valid(now) || share.kind.is_public() {
                continue;
            }
            let Some(session) = inner.sessions.get(&share.session_id) else {
                continue;
            };
            if session.owner_id == viewer.user_id {
                continue;
            }
            if let Some(grant) = share.grant_for(Some(viewer)) {
                out.extend(inner.visible(session, grant));
            }
        }
        Ok(out)
    }

    async fn sessions_not_owned_by(&self, viewer_id: UserId) -> Result<Vec<VisibleSession>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .sessions
            .values()
            .filter(|s| s.owner_id != viewer_id)
            .filter_map(|s| inner.visible(s, AccessGrant::synthetic(AccessType::System)))
            .collect())
    }

    async fn visibility_changed_at(&self, now: i64) -> Result<i64> {
        let inner = self.inner.read().unwrap();
        let last_expiry = inner
            .shares
            .values()
            .filter_map(|s| s.share.expires_at)
            .filter(|&at| at <= now)
            .max()
            .unwrap_or(0);
        Ok(inner.visibility_stamp.max(last_expiry))
    }
}

/// Drop repeated entries, keeping the first occurrence.
fn dedup_in_place(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_user_resolves_pending_invites() {
        let store = MemoryStore::new();
        let alice = store.create_user("alice@example.com", None, 1).await.unwrap();
        let session = Session::new(alice.id, "ext", 1);
        store.upsert_session(&session).await.unwrap();

        let share = store
            .create_share(
                &session.id,
                alice.id,
                &NewShare::Recipients(vec!["Dana@Example.com".into()]),
                None,
                2,
            )
            .await
            .unwrap();
        assert_eq!(share.kind.recipients()[0].user_id, None);

        let dana = store.create_user("dana@example.com", None, 3).await.unwrap();
        let share = store.get_share(&share.id).await.unwrap().unwrap();
        assert_eq!(share.kind.recipients()[0].user_id, Some(dana.id));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        store.create_user("alice@example.com", None, 1).await.unwrap();
        let err = store
            .create_user("ALICE@example.com", None, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_upsert_requires_owner() {
        let store = MemoryStore::new();
        let session = Session::new(UserId(99), "ext", 1);
        let err = store.upsert_session(&session).await.unwrap_err();
        assert!(matches!(err, StoreError::UserNotFound(UserId(99))));
    }
}
