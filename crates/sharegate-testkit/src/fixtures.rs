//! Test fixtures and helpers.
//!
//! Common setup code for integration tests. Helpers panic on failure; they
//! are only meant for tests.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use sharegate::{Gateway, GatewayConfig};
use sharegate_core::{NewShare, Session, Share, User, UserId};
use sharegate_store::MemoryStore;

/// Time every fixture starts at (Unix ms).
pub const START_TIME: i64 = 1_700_000_000_000;

/// A gateway over a memory store with a clock the test controls.
pub struct TestFixture {
    pub gateway: Gateway<MemoryStore>,
    clock: Arc<AtomicI64>,
}

impl TestFixture {
    /// Create a fixture with default configuration.
    pub fn new() -> Self {
        Self::with_config(GatewayConfig::default())
    }

    /// Create a fixture with the given configuration.
    pub fn with_config(config: GatewayConfig) -> Self {
        let clock = Arc::new(AtomicI64::new(START_TIME));
        let source = Arc::clone(&clock);
        let gateway = Gateway::new(MemoryStore::new(), config)
            .with_clock(move || source.load(Ordering::SeqCst));
        Self { gateway, clock }
    }

    /// Create a fixture in share-all mode.
    pub fn share_all() -> Self {
        Self::with_config(GatewayConfig {
            share_all_sessions: true,
            ..GatewayConfig::default()
        })
    }

    /// Current fixture time.
    pub fn now(&self) -> i64 {
        self.clock.load(Ordering::SeqCst)
    }

    /// Set the fixture time.
    pub fn set_time(&self, now: i64) {
        self.clock.store(now, Ordering::SeqCst);
    }

    /// Move the clock forward by `ms`.
    pub fn advance(&self, ms: i64) -> i64 {
        self.clock.fetch_add(ms, Ordering::SeqCst) + ms
    }

    /// Register a user.
    pub async fn user(&self, email: &str) -> User {
        self.gateway
            .create_user(email, None)
            .await
            .expect("create user")
    }

    /// Register `count` users named `user{n}@example.com`, starting at 1.
    pub async fn users(&self, count: usize) -> Vec<User> {
        let mut users = Vec::with_capacity(count);
        for n in 1..=count {
            users.push(self.user(&format!("user{n}@example.com")).await);
        }
        users
    }

    /// Store a listable session for `owner`, active at the current time.
    pub async fn session(&self, owner: UserId, external_id: &str) -> Session {
        self.session_with(owner, external_id, |_| {}).await
    }

    /// Store a listable session after letting `edit` adjust it.
    pub async fn session_with<F>(&self, owner: UserId, external_id: &str, edit: F) -> Session
    where
        F: FnOnce(&mut Session),
    {
        let mut session = Session::new(owner, external_id, self.now());
        session.summary = Some(format!("session {external_id}"));
        session.total_lines = 1;
        session.file_count = 1;
        edit(&mut session);
        self.gateway
            .upsert_session(session)
            .await
            .expect("upsert session")
    }

    /// Share `session` publicly.
    pub async fn public_share(&self, session: &Session) -> Share {
        self.share(session, NewShare::Public, None).await
    }

    /// Share `session` with the given addresses.
    pub async fn recipient_share(&self, session: &Session, emails: &[&str]) -> Share {
        let emails = emails.iter().map(|e| e.to_string()).collect();
        self.share(session, NewShare::Recipients(emails), None).await
    }

    /// Share `session` with every authenticated user.
    pub async fn system_share(&self, session: &Session) -> Share {
        self.gateway
            .create_system_share(&session.id.to_hex(), None)
            .await
            .expect("create system share")
    }

    /// Create a share as the session's owner.
    pub async fn share(&self, session: &Session, share: NewShare, expires_at: Option<i64>) -> Share {
        self.gateway
            .create_share(&session.id.to_hex(), session.owner_id, share, expires_at)
            .await
            .expect("create share")
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A fixture with `count` registered users, for multi-party tests.
pub async fn multi_party_fixture(count: usize) -> (TestFixture, Vec<User>) {
    let fixture = TestFixture::new();
    let users = fixture.users(count).await;
    (fixture, users)
}
