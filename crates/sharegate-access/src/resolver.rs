//! Access resolution for a single session.
//!
//! Resolution is split in two: [`resolve_with_shares`] is a pure function over
//! a session and its shares, and [`AccessResolver`] feeds it from a store.

use sharegate_core::{
    strongest_grant, AccessGrant, AccessInfo, AccessType, Session, SessionDetail, SessionId,
    Share, UserId, Viewer,
};
use sharegate_store::Store;

use crate::error::{AccessError, Result};
use crate::redact::redact_detail;

/// Operator-level switches that change who can see what.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    /// Every authenticated user sees every session at `system` level.
    pub share_all_sessions: bool,
}

/// Decide a viewer's access to `session` given all of its shares.
///
/// Expired shares and shares of other sessions are ignored. `now` is Unix ms.
pub fn resolve_with_shares(
    session: &Session,
    viewer: Option<&Viewer>,
    shares: &[Share],
    policy: AccessPolicy,
    now: i64,
) -> AccessInfo {
    if viewer.is_some_and(|v| v.user_id == session.owner_id) {
        return AccessInfo::owner();
    }

    let valid: Vec<&Share> = shares
        .iter()
        .filter(|s| s.session_id == session.id && s.is_valid(now))
        .collect();

    let mut grants: Vec<AccessGrant> = valid.iter().filter_map(|s| s.grant_for(viewer)).collect();
    if policy.share_all_sessions && viewer.is_some() {
        grants.push(AccessGrant::synthetic(AccessType::System));
    }

    match strongest_grant(grants) {
        Some(grant) => grant.into(),
        None => {
            let auth_may_help = viewer.is_none() && valid.iter().any(|s| s.kind.requires_auth());
            AccessInfo::none(auth_may_help)
        }
    }
}

/// Resolves viewers against sessions held in a [`Store`].
pub struct AccessResolver<'a, S: Store + ?Sized> {
    store: &'a S,
    policy: AccessPolicy,
}

impl<'a, S: Store + ?Sized> AccessResolver<'a, S> {
    pub fn new(store: &'a S, policy: AccessPolicy) -> Self {
        Self { store, policy }
    }

    /// Look up the viewer's identity.
    ///
    /// An id with no user row keeps its id but matches no recipient email.
    pub async fn viewer(&self, viewer_id: Option<UserId>) -> Result<Option<Viewer>> {
        let Some(id) = viewer_id else {
            return Ok(None);
        };
        let email = self
            .store
            .get_user(id)
            .await?
            .map(|u| u.email)
            .unwrap_or_default();
        Ok(Some(Viewer::new(id, email)))
    }

    /// Resolve access and hand back the session that was resolved against.
    pub async fn resolve_session(
        &self,
        session_id: &SessionId,
        viewer_id: Option<UserId>,
        now: i64,
    ) -> Result<(Session, AccessInfo)> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or(AccessError::SessionNotFound(*session_id))?;

        let viewer = self.viewer(viewer_id).await?;
        let info = if viewer.as_ref().is_some_and(|v| v.user_id == session.owner_id) {
            AccessInfo::owner()
        } else {
            let shares = self.store.shares_for_session(session_id).await?;
            resolve_with_shares(&session, viewer.as_ref(), &shares, self.policy, now)
        };

        tracing::debug!(
            session_id = %session_id,
            viewer = ?viewer_id,
            access = %info.access_type,
            auth_may_help = info.auth_may_help,
            "resolved access"
        );
        Ok((session, info))
    }

    /// `(session, viewer?) -> AccessInfo`.
    ///
    /// "No access" is a normal result; only a missing session is an error.
    pub async fn resolve(
        &self,
        session_id: &SessionId,
        viewer_id: Option<UserId>,
        now: i64,
    ) -> Result<AccessInfo> {
        self.resolve_session(session_id, viewer_id, now)
            .await
            .map(|(_, info)| info)
    }

    /// Resolve, enforce, and redact: the single-session read path.
    ///
    /// Non-owners are refused when the owner is inactive. A read through a
    /// share stamps that share's `last_accessed_at`; failures there are logged
    /// and ignored.
    pub async fn open_session(
        &self,
        session_id: &SessionId,
        viewer_id: Option<UserId>,
        now: i64,
    ) -> Result<(SessionDetail, AccessInfo)> {
        let (session, info) = self.resolve_session(session_id, viewer_id, now).await?;
        if !info.has_access() {
            return Err(AccessError::Denied {
                auth_may_help: info.auth_may_help,
            });
        }

        let owner = self.store.get_user(session.owner_id).await?;
        let owner_email = owner.as_ref().map(|u| u.email.clone()).unwrap_or_default();
        if !info.is_owner() && owner.as_ref().map_or(true, |u| u.is_inactive()) {
            return Err(AccessError::OwnerInactive);
        }

        if let Some(share_id) = info.share_id {
            if let Err(e) = self.store.touch_share(&share_id, now).await {
                tracing::warn!(share_id = %share_id, error = %e, "failed to record share access");
            }
        }

        Ok((redact_detail(session, &info, &owner_email), info))
    }
}
