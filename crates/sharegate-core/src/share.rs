//! Shares: grants of access to a session.
//!
//! A share is exactly one of three kinds. Storage keeps each kind in its own
//! side table; in memory the kind is a sum type so precedence logic can match
//! on it exhaustively.

use serde::{Deserialize, Serialize};

use crate::access::{AccessGrant, AccessType};
use crate::email::emails_match;
use crate::types::{SessionId, ShareId, UserId};

/// An authenticated viewer as seen by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    /// The viewer's user id.
    pub user_id: UserId,
    /// The viewer's current verified email.
    pub email: String,
}

impl Viewer {
    /// Create a viewer identity.
    pub fn new(user_id: UserId, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
        }
    }
}

/// One invited address on a recipient share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// The address as entered by the owner.
    pub email: String,

    /// The registered user with this address, once known.
    pub user_id: Option<UserId>,
}

impl Recipient {
    /// Whether this entry designates the viewer.
    ///
    /// Matches on the stored user id, or on the viewer's live email for
    /// invites sent before the viewer registered.
    pub fn matches(&self, viewer: &Viewer) -> bool {
        self.user_id == Some(viewer.user_id) || emails_match(&self.email, &viewer.email)
    }
}

/// The kind of a share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "recipients", rename_all = "lowercase")]
pub enum ShareKind {
    /// Anyone with the link.
    Public,
    /// Any authenticated user.
    System,
    /// Specific invited addresses.
    Recipient(Vec<Recipient>),
}

impl ShareKind {
    /// The access level this kind grants when it applies.
    pub fn access_type(&self) -> AccessType {
        match self {
            ShareKind::Public => AccessType::Public,
            ShareKind::System => AccessType::System,
            ShareKind::Recipient(_) => AccessType::Recipient,
        }
    }

    /// Whether a viewer must be logged in for this kind to apply.
    pub fn requires_auth(&self) -> bool {
        !matches!(self, ShareKind::Public)
    }

    /// Recipient entries (empty for public and system shares).
    pub fn recipients(&self) -> &[Recipient] {
        match self {
            ShareKind::Recipient(recipients) => recipients,
            ShareKind::Public | ShareKind::System => &[],
        }
    }

    /// Whether this is a public share.
    pub fn is_public(&self) -> bool {
        matches!(self, ShareKind::Public)
    }
}

/// A share row with its kind attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub id: ShareId,
    pub session_id: SessionId,
    pub kind: ShareKind,
    /// Expiry (Unix ms). `None` never expires.
    pub expires_at: Option<i64>,
    pub created_at: i64,
    pub last_accessed_at: Option<i64>,
}

impl Share {
    /// Whether the share's time window has passed at `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }

    /// Whether the share may grant anything at `now`.
    pub fn is_valid(&self, now: i64) -> bool {
        !self.is_expired(now)
    }

    /// The grant this share gives `viewer`, ignoring expiry.
    pub fn grant_for(&self, viewer: Option<&Viewer>) -> Option<AccessGrant> {
        let applies = match (&self.kind, viewer) {
            (ShareKind::Public, _) => true,
            (ShareKind::System, Some(_)) => true,
            (ShareKind::Recipient(recipients), Some(viewer)) => {
                recipients.iter().any(|r| r.matches(viewer))
            }
            (ShareKind::System, None) | (ShareKind::Recipient(_), None) => false,
        };
        applies.then(|| AccessGrant::via_share(self.kind.access_type(), self.id, self.created_at))
    }

    /// Recipient emails, sorted.
    pub fn recipient_emails(&self) -> Vec<String> {
        let mut emails: Vec<String> = self
            .kind
            .recipients()
            .iter()
            .map(|r| r.email.clone())
            .collect();
        emails.sort();
        emails
    }
}

/// Kinds an owner may create directly.
///
/// System shares are only created through the privileged path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "emails", rename_all = "lowercase")]
pub enum NewShare {
    /// Anyone with the link.
    Public,
    /// The listed addresses.
    Recipients(Vec<String>),
}

/// A share together with the session it belongs to, for management screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareWithSession {
    #[serde(flatten)]
    pub share: Share,
    pub external_id: String,
    pub session_summary: Option<String>,
    pub session_first_user_message: Option<String>,
}
