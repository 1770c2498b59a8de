//! The Gateway: unified API for session sharing.
//!
//! The Gateway brings together storage, access resolution, and listing
//! behind the operations an HTTP layer calls. Ids arrive as the hex strings
//! clients send; a malformed id is indistinguishable from a missing one.

use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use sharegate_access::{
    AccessResolver, FreshnessClock, ListRequest, ListView, ListingEngine, SessionPage,
};
use sharegate_core::{
    now_millis, validate_email, AccessInfo, GithubLink, NewShare, Session, SessionDetail,
    SessionId, Share, ShareId, ShareWithSession, User, UserId, UserStatus,
};
use sharegate_store::{SqliteStore, Store};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};

/// Source of "now" in Unix milliseconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// The main Gateway struct.
///
/// Provides a unified API for:
/// - Resolving a viewer's access to a session
/// - Creating, revoking and listing shares
/// - Listing sessions with filters, facets and pagination
/// - Reading a single session with redaction applied
pub struct Gateway<S: Store> {
    /// The storage backend.
    store: Arc<S>,
    /// Configuration.
    config: GatewayConfig,
    /// Time source.
    clock: Clock,
}

impl<S: Store> fmt::Debug for Gateway<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Gateway<SqliteStore> {
    /// Open a SQLite-backed gateway from configuration.
    ///
    /// Uses `database_path` when set, otherwise an in-memory database.
    pub fn open(config: GatewayConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let store = match &config.database_path {
            Some(path) => SqliteStore::open(path)
                .with_context(|| format!("opening database {}", path.display()))?,
            None => SqliteStore::open_memory().context("opening in-memory database")?,
        };
        tracing::info!(
            database = ?config.database_path,
            share_all_sessions = config.share_all_sessions,
            "gateway opened"
        );
        Ok(Self::new(store, config))
    }
}

impl<S: Store> Gateway<S> {
    /// Create a new gateway over `store`, reading the system clock.
    pub fn new(store: S, config: GatewayConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
            clock: Arc::new(now_millis),
        }
    }

    /// Replace the time source.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> i64 + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }

    fn resolver(&self) -> AccessResolver<'_, S> {
        AccessResolver::new(self.store.as_ref(), self.config.policy())
    }

    fn listing(&self) -> ListingEngine<'_, S> {
        ListingEngine::new(
            self.store.as_ref(),
            self.config.policy(),
            self.config.page_limits(),
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Access
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolve what `viewer` may do with a session.
    ///
    /// No access is an ordinary `AccessInfo`; only a missing session errors.
    pub async fn resolve_access(
        &self,
        session_id: &str,
        viewer: Option<UserId>,
    ) -> Result<AccessInfo> {
        let id = parse_session_id(session_id)?;
        Ok(self.resolver().resolve(&id, viewer, self.now()).await?)
    }

    /// Read one session as `viewer` sees it.
    pub async fn get_session_with_access(
        &self,
        session_id: &str,
        viewer: Option<UserId>,
    ) -> Result<(SessionDetail, AccessInfo)> {
        let id = parse_session_id(session_id)?;
        Ok(self.resolver().open_session(&id, viewer, self.now()).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Shares
    // ─────────────────────────────────────────────────────────────────────────

    /// Share a session the caller owns.
    pub async fn create_share(
        &self,
        session_id: &str,
        owner: UserId,
        share: NewShare,
        expires_at: Option<i64>,
    ) -> Result<Share> {
        let id = parse_session_id(session_id)?;
        let created = self
            .store
            .create_share(&id, owner, &share, expires_at, self.now())
            .await?;
        tracing::info!(
            share_id = %created.id,
            session_id = %id,
            owner = %owner,
            kind = %created.kind.access_type(),
            recipients = created.kind.recipients().len(),
            "share created"
        );
        Ok(created)
    }

    /// Open a session to every authenticated user. Privileged.
    pub async fn create_system_share(
        &self,
        session_id: &str,
        expires_at: Option<i64>,
    ) -> Result<Share> {
        let id = parse_session_id(session_id)?;
        let created = self
            .store
            .create_system_share(&id, expires_at, self.now())
            .await?;
        tracing::info!(share_id = %created.id, session_id = %id, "system share created");
        Ok(created)
    }

    /// Revoke a share on a session the caller owns.
    pub async fn revoke_share(&self, share_id: &str, owner: UserId) -> Result<()> {
        let id: ShareId = share_id.parse().map_err(|_| GatewayError::Unauthorized)?;
        self.store.revoke_share(&id, owner, self.now()).await?;
        tracing::info!(share_id = %id, owner = %owner, "share revoked");
        Ok(())
    }

    /// Shares of one owned session, newest first, expired included.
    pub async fn list_shares(&self, session_id: &str, owner: UserId) -> Result<Vec<Share>> {
        let id = parse_session_id(session_id)?;
        Ok(self.store.list_shares(&id, owner).await?)
    }

    /// Every share the caller has made, newest first.
    pub async fn list_all_user_shares(&self, owner: UserId) -> Result<Vec<ShareWithSession>> {
        Ok(self.store.list_all_user_shares(owner).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Listing
    // ─────────────────────────────────────────────────────────────────────────

    /// One page of sessions visible to `viewer`.
    pub async fn list_sessions(&self, viewer: UserId, request: &ListRequest) -> Result<SessionPage> {
        Ok(self.listing().list(viewer, request, self.now()).await?)
    }

    /// Last change across everything `viewer` can see in `view`, including
    /// sessions that stopped being visible.
    pub async fn get_list_last_modified(&self, viewer: UserId, view: ListView) -> Result<i64> {
        let listing = self.listing();
        let clock = FreshnessClock::new(&listing);
        Ok(clock.list_last_modified(viewer, view, self.now()).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────────

    /// Confirm `user` owns a session and return its external id.
    pub async fn verify_session_ownership(&self, session_id: &str, user: UserId) -> Result<String> {
        let id = parse_session_id(session_id)?;
        let session = self
            .store
            .get_session(&id)
            .await?
            .ok_or_else(GatewayError::not_found)?;
        if session.owner_id != user {
            return Err(GatewayError::Forbidden);
        }
        Ok(session.external_id)
    }

    /// Delete an owned session and everything hanging off it.
    pub async fn delete_session(&self, session_id: &str, owner: UserId) -> Result<()> {
        let id = parse_session_id(session_id)?;
        if !self.store.delete_session(&id, owner, self.now()).await? {
            return Err(GatewayError::not_found());
        }
        tracing::info!(session_id = %id, owner = %owner, "session deleted");
        Ok(())
    }

    /// Insert or replace a session, stamping `updated_at`.
    ///
    /// An id that already belongs to another user is `NotFound`.
    pub async fn upsert_session(&self, mut session: Session) -> Result<Session> {
        session.updated_at = self.now();
        self.store.upsert_session(&session).await?;
        tracing::debug!(session_id = %session.id, owner = %session.owner_id, "session stored");
        Ok(session)
    }

    /// Record a completed sync.
    pub async fn record_sync(
        &self,
        session_id: &SessionId,
        file_count: i64,
        total_lines: i64,
        last_activity_at: Option<i64>,
    ) -> Result<()> {
        self.store
            .record_sync(session_id, file_count, total_lines, last_activity_at, self.now())
            .await?;
        tracing::debug!(session_id = %session_id, file_count, total_lines, "sync recorded");
        Ok(())
    }

    /// Link a pull request or commit to a session.
    pub async fn add_github_link(&self, session_id: &SessionId, link: &GithubLink) -> Result<()> {
        self.store
            .add_github_link(session_id, link, self.now())
            .await?;
        tracing::debug!(
            session_id = %session_id,
            kind = link.kind_label(),
            reference = link.reference(),
            "github link added"
        );
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a user, binding any invites already sent to their email.
    pub async fn create_user(&self, email: &str, display_name: Option<&str>) -> Result<User> {
        validate_email(email).map_err(|e| GatewayError::InvalidInput(e.to_string()))?;
        let user = self
            .store
            .create_user(email, display_name, self.now())
            .await?;
        tracing::debug!(user = %user.id, "user created");
        Ok(user)
    }

    /// Activate or deactivate a user.
    pub async fn set_user_status(&self, user: UserId, status: UserStatus) -> Result<()> {
        self.store.set_user_status(user, status, self.now()).await?;
        tracing::info!(user = %user, status = %status, "user status changed");
        Ok(())
    }
}

fn parse_session_id(raw: &str) -> Result<SessionId> {
    raw.parse().map_err(|_| GatewayError::not_found())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use sharegate_access::ListView;
    use sharegate_core::AccessType;
    use sharegate_store::MemoryStore;

    fn gateway() -> Gateway<MemoryStore> {
        Gateway::new(MemoryStore::new(), GatewayConfig::default()).with_clock(|| 1_000)
    }

    async fn owned_session(gw: &Gateway<MemoryStore>, owner: UserId) -> Session {
        let mut session = Session::new(owner, "ext-1", 500);
        session.summary = Some("fix the parser".into());
        session.total_lines = 10;
        gw.upsert_session(session).await.unwrap()
    }

    #[tokio::test]
    async fn test_malformed_id_is_not_found() {
        let gw = gateway();
        let err = gw.resolve_access("not-hex", None).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound { auth_may_help: false }));
    }

    #[tokio::test]
    async fn test_upsert_stamps_updated_at() {
        let gw = gateway();
        let alice = gw.create_user("alice@example.com", None).await.unwrap();
        let session = owned_session(&gw, alice.id).await;
        assert_eq!(session.updated_at, 1_000);
        assert_eq!(
            gw.get_list_last_modified(alice.id, ListView::Owned).await.unwrap(),
            1_000
        );
    }

    #[tokio::test]
    async fn test_upsert_cannot_take_a_session_over() {
        let gw = gateway();
        let alice = gw.create_user("alice@example.com", None).await.unwrap();
        let bob = gw.create_user("bob@example.com", None).await.unwrap();
        let mut session = Session::new(alice.id, "ext-1", 500);
        session.summary = Some("fix the parser".into());
        session.total_lines = 10;
        session.hostname = Some("alice-laptop".into());
        let session = gw.upsert_session(session).await.unwrap();

        let mut taken = session.clone();
        taken.owner_id = bob.id;
        let err = gw.upsert_session(taken).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let id = session.id.to_hex();
        let info = gw.resolve_access(&id, Some(bob.id)).await.unwrap();
        assert_eq!(info.access_type, AccessType::None);
        assert_eq!(gw.verify_session_ownership(&id, alice.id).await.unwrap(), "ext-1");
    }

    #[tokio::test]
    async fn test_verify_ownership() {
        let gw = gateway();
        let alice = gw.create_user("alice@example.com", None).await.unwrap();
        let bob = gw.create_user("bob@example.com", None).await.unwrap();
        let session = owned_session(&gw, alice.id).await;
        let id = session.id.to_hex();

        assert_eq!(gw.verify_session_ownership(&id, alice.id).await.unwrap(), "ext-1");
        assert!(matches!(
            gw.verify_session_ownership(&id, bob.id).await,
            Err(GatewayError::Forbidden)
        ));
        let missing = SessionId::generate().to_hex();
        assert!(matches!(
            gw.verify_session_ownership(&missing, alice.id).await,
            Err(GatewayError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_user_rejects_bad_email() {
        let gw = gateway();
        let err = gw.create_user("nope", None).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_share_lifecycle() {
        let gw = gateway();
        let alice = gw.create_user("alice@example.com", None).await.unwrap();
        let bob = gw.create_user("bob@example.com", None).await.unwrap();
        let session = owned_session(&gw, alice.id).await;
        let id = session.id.to_hex();

        let share = gw
            .create_share(&id, alice.id, NewShare::Recipients(vec!["BOB@example.com".into()]), None)
            .await
            .unwrap();
        let info = gw.resolve_access(&id, Some(bob.id)).await.unwrap();
        assert_eq!(info.access_type, AccessType::Recipient);

        assert!(matches!(
            gw.revoke_share(&share.id.to_hex(), bob.id).await,
            Err(GatewayError::Unauthorized)
        ));
        gw.revoke_share(&share.id.to_hex(), alice.id).await.unwrap();
        let info = gw.resolve_access(&id, Some(bob.id)).await.unwrap();
        assert_eq!(info.access_type, AccessType::None);
    }
}
