//! Proptest generators for property-based testing.
//!
//! [`ShareLayout`] describes one session, one viewer and a pile of shares,
//! and knows the access level that viewer should end up with, computed
//! without going through the precedence code under test.

use proptest::prelude::*;

use sharegate_core::{
    AccessType, GitInfo, Recipient, Session, SessionId, Share, ShareId, ShareKind, UserId,
    Viewer, ID_LEN,
};

/// Owner of the generated session.
pub const OWNER: UserId = UserId(1);
/// The non-owner viewer.
pub const VIEWER: UserId = UserId(2);
/// Resolution time for generated layouts.
pub const NOW: i64 = 1_000_000;

const OWNER_EMAIL: &str = "owner@example.com";
const VIEWER_EMAIL: &str = "viewer@example.com";
const BYSTANDER_EMAIL: &str = "someone@example.com";

/// Who is looking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerRole {
    Anonymous,
    Owner,
    Other,
}

/// Which addresses a recipient share lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipientShape {
    pub lists_viewer: bool,
    /// Bound to the viewer's user id rather than matched by email.
    pub bound: bool,
    /// Entered with different letter case than the viewer's address.
    pub shouty: bool,
    pub lists_owner: bool,
}

/// The kind of one generated share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareShape {
    Public,
    System,
    Recipient(RecipientShape),
}

/// One generated share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShareParams {
    pub shape: ShareShape,
    pub expired: bool,
    pub created_at: i64,
}

/// A session, a viewer, and the shares between them.
#[derive(Debug, Clone)]
pub struct ShareLayout {
    pub viewer: ViewerRole,
    pub share_all: bool,
    pub shares: Vec<ShareParams>,
}

/// Generate a viewer role.
pub fn viewer_role() -> impl Strategy<Value = ViewerRole> {
    prop_oneof![
        Just(ViewerRole::Anonymous),
        Just(ViewerRole::Owner),
        Just(ViewerRole::Other),
    ]
}

/// Generate a share kind.
pub fn share_shape() -> impl Strategy<Value = ShareShape> {
    prop_oneof![
        Just(ShareShape::Public),
        Just(ShareShape::System),
        (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
            |(lists_viewer, bound, shouty, lists_owner)| {
                ShareShape::Recipient(RecipientShape {
                    lists_viewer,
                    bound,
                    shouty,
                    lists_owner,
                })
            }
        ),
    ]
}

/// Generate one share. Creation times collide often on purpose.
pub fn share_params() -> impl Strategy<Value = ShareParams> {
    (share_shape(), any::<bool>(), 0i64..8).prop_map(|(shape, expired, created_at)| ShareParams {
        shape,
        expired,
        created_at,
    })
}

impl Arbitrary for ShareLayout {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            viewer_role(),
            any::<bool>(),
            prop::collection::vec(share_params(), 0..8),
        )
            .prop_map(|(viewer, share_all, shares)| ShareLayout {
                viewer,
                share_all,
                shares,
            })
            .boxed()
    }
}

impl ShareLayout {
    /// The session every share points at.
    pub fn session(&self) -> Session {
        let mut session = Session::new(OWNER, "generated", 0);
        session.id = SessionId::from_bytes([0xAA; ID_LEN]);
        session.total_lines = 1;
        session
    }

    /// The viewer identity.
    pub fn viewer(&self) -> Option<Viewer> {
        match self.viewer {
            ViewerRole::Anonymous => None,
            ViewerRole::Owner => Some(Viewer::new(OWNER, OWNER_EMAIL)),
            ViewerRole::Other => Some(Viewer::new(VIEWER, VIEWER_EMAIL)),
        }
    }

    /// Materialize the shares against `session`.
    pub fn build_shares(&self, session: &Session) -> Vec<Share> {
        self.shares
            .iter()
            .enumerate()
            .map(|(i, params)| Share {
                id: ShareId::from_bytes([i as u8 + 1; ID_LEN]),
                session_id: session.id,
                kind: share_kind(params.shape),
                expires_at: params.expired.then_some(NOW - 1),
                created_at: params.created_at,
                last_accessed_at: None,
            })
            .collect()
    }

    /// The access level the viewer should resolve to.
    pub fn expected_access(&self) -> AccessType {
        if self.viewer == ViewerRole::Owner {
            return AccessType::Owner;
        }
        let logged_in = self.viewer != ViewerRole::Anonymous;

        let mut best = AccessType::None;
        let mut consider = |level: AccessType| {
            if rank(level) > rank(best) {
                best = level;
            }
        };
        for params in self.shares.iter().filter(|p| !p.expired) {
            match params.shape {
                ShareShape::Public => consider(AccessType::Public),
                ShareShape::System if logged_in => consider(AccessType::System),
                ShareShape::Recipient(r) if logged_in && r.lists_viewer => {
                    consider(AccessType::Recipient)
                }
                _ => {}
            }
        }
        if self.share_all && logged_in {
            consider(AccessType::System);
        }
        best
    }

    /// Whether an anonymous viewer would be told to log in.
    pub fn expected_auth_may_help(&self) -> bool {
        self.viewer == ViewerRole::Anonymous
            && self.expected_access() == AccessType::None
            && self
                .shares
                .iter()
                .any(|p| !p.expired && !matches!(p.shape, ShareShape::Public))
    }
}

fn share_kind(shape: ShareShape) -> ShareKind {
    match shape {
        ShareShape::Public => ShareKind::Public,
        ShareShape::System => ShareKind::System,
        ShareShape::Recipient(r) => {
            let mut recipients = vec![Recipient {
                email: BYSTANDER_EMAIL.into(),
                user_id: None,
            }];
            if r.lists_viewer {
                let email = if r.shouty {
                    VIEWER_EMAIL.to_uppercase()
                } else {
                    VIEWER_EMAIL.to_string()
                };
                recipients.push(Recipient {
                    // A bound entry keeps a stale address to prove the id wins.
                    email: if r.bound { "old-address@example.com".into() } else { email },
                    user_id: r.bound.then_some(VIEWER),
                });
            }
            if r.lists_owner {
                recipients.push(Recipient {
                    email: OWNER_EMAIL.into(),
                    user_id: Some(OWNER),
                });
            }
            ShareKind::Recipient(recipients)
        }
    }
}

fn rank(level: AccessType) -> u8 {
    match level {
        AccessType::None => 0,
        AccessType::Public => 1,
        AccessType::System => 2,
        AccessType::Recipient => 3,
        AccessType::Owner => 4,
    }
}

/// Parameters for a listable session.
///
/// Activity times are drawn from a narrow range so ties are common.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    /// Index of the owning party.
    pub owner: usize,
    pub activity: i64,
    pub repo: Option<&'static str>,
    pub branch: Option<&'static str>,
    /// Grant the listing viewer a recipient share.
    pub shared_with_viewer: bool,
}

const REPO_URLS: [&str; 3] = [
    "https://github.com/acme/api.git",
    "git@github.com:acme/web.git",
    "https://github.com/other/tools",
];

const BRANCHES: [&str; 2] = ["main", "dev"];

/// Generate one listable session among `parties` owners.
pub fn session_params(parties: usize) -> impl Strategy<Value = SessionParams> {
    (
        0..parties.max(1),
        0i64..6,
        prop::option::of(prop::sample::select(REPO_URLS.to_vec())),
        prop::option::of(prop::sample::select(BRANCHES.to_vec())),
        any::<bool>(),
    )
        .prop_map(|(owner, activity, repo, branch, shared_with_viewer)| SessionParams {
            owner,
            activity,
            repo,
            branch,
            shared_with_viewer,
        })
}

impl SessionParams {
    /// Write the generated fields into `session`.
    pub fn apply(&self, session: &mut Session) {
        session.last_activity_at = Some(self.activity);
        session.git = GitInfo {
            repo_url: self.repo.map(str::to_string),
            branch: self.branch.map(str::to_string),
        };
    }
}
