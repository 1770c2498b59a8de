//! Sessions, users, and the projections handed to viewers.
//!
//! [`Session`] is the stored record, PII included. Viewers only ever receive
//! [`SessionDetail`] or [`SessionListItem`], which are built by the redactor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::access::AccessType;
use crate::error::CoreError;
use crate::types::{SessionId, UserId};

/// Account status as maintained by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
}

impl UserStatus {
    /// Stable storage label.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            other => Err(CoreError::UnknownLabel {
                kind: "user status",
                label: other.to_string(),
            }),
        }
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub status: UserStatus,
    pub created_at: i64,
}

impl User {
    /// Whether the account has been deactivated.
    pub fn is_inactive(&self) -> bool {
        self.status == UserStatus::Inactive
    }
}

/// Git metadata captured with a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitInfo {
    pub repo_url: Option<String>,
    pub branch: Option<String>,
}

impl GitInfo {
    /// `org/repo` derived from the remote URL.
    pub fn repo_name(&self) -> Option<String> {
        self.repo_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .map(extract_repo_name)
    }
}

/// Extract `org/repo` from a git remote URL.
///
/// Handles `https://host/org/repo(.git)` and `git@host:org/repo(.git)`;
/// anything else is returned unchanged (minus a `.git` suffix).
pub fn extract_repo_name(repo_url: &str) -> String {
    let url = repo_url.strip_suffix(".git").unwrap_or(repo_url);

    if url.contains("://") {
        let parts: Vec<&str> = url.split('/').collect();
        if parts.len() >= 2 {
            return format!("{}/{}", parts[parts.len() - 2], parts[parts.len() - 1]);
        }
    }

    if url.contains('@') {
        if let Some((_, path)) = url.split_once(':') {
            if !path.contains(':') {
                return path.to_string();
            }
        }
    }

    url.to_string()
}

/// A GitHub artifact linked to a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ref", rename_all = "snake_case")]
pub enum GithubLink {
    /// Pull request number.
    PullRequest(String),
    /// Full or abbreviated commit SHA.
    Commit(String),
}

impl GithubLink {
    /// Storage label for the link kind.
    pub fn kind_label(&self) -> &'static str {
        match self {
            GithubLink::PullRequest(_) => "pull_request",
            GithubLink::Commit(_) => "commit",
        }
    }

    /// The PR number or SHA.
    pub fn reference(&self) -> &str {
        match self {
            GithubLink::PullRequest(r) | GithubLink::Commit(r) => r,
        }
    }

    /// Rebuild from a stored `(kind, ref)` pair.
    pub fn from_parts(kind: &str, reference: impl Into<String>) -> Result<Self, CoreError> {
        match kind {
            "pull_request" => Ok(GithubLink::PullRequest(reference.into())),
            "commit" => Ok(GithubLink::Commit(reference.into())),
            other => Err(CoreError::UnknownLabel {
                kind: "github link",
                label: other.to_string(),
            }),
        }
    }
}

/// A stored session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// Identifier supplied by the syncing client; stable across resyncs.
    pub external_id: String,
    pub owner_id: UserId,

    pub custom_title: Option<String>,
    pub suggested_title: Option<String>,
    pub summary: Option<String>,
    pub first_user_message: Option<String>,
    pub session_type: String,
    pub git: GitInfo,

    pub first_seen: i64,
    pub last_activity_at: Option<i64>,
    pub last_sync_at: Option<i64>,
    /// Bumped on every mutation; feeds the list freshness clock.
    pub updated_at: i64,

    pub file_count: i64,
    pub total_lines: i64,

    /// Linked pull-request numbers, oldest first.
    pub github_prs: Vec<String>,
    /// Linked commit SHAs, newest first.
    pub github_commits: Vec<String>,

    // Owner-only fields.
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub cwd: Option<String>,
    pub transcript_path: Option<String>,
}

impl Session {
    /// A fresh, empty session owned by `owner_id`.
    pub fn new(owner_id: UserId, external_id: impl Into<String>, now: i64) -> Self {
        Self {
            id: SessionId::generate(),
            external_id: external_id.into(),
            owner_id,
            custom_title: None,
            suggested_title: None,
            summary: None,
            first_user_message: None,
            session_type: "claude_code".to_string(),
            git: GitInfo::default(),
            first_seen: now,
            last_activity_at: None,
            last_sync_at: None,
            updated_at: now,
            file_count: 0,
            total_lines: 0,
            github_prs: Vec::new(),
            github_commits: Vec::new(),
            hostname: None,
            username: None,
            cwd: None,
            transcript_path: None,
        }
    }

    /// The timestamp lists are sorted by.
    pub fn activity_time(&self) -> i64 {
        self.last_activity_at.unwrap_or(self.first_seen)
    }

    /// Sort key for lists: newest activity first, id as tie-break.
    pub fn sort_key(&self) -> (i64, SessionId) {
        (self.activity_time(), self.id)
    }

    /// A session shows up in lists only once it has content and synced lines.
    pub fn is_materialized(&self) -> bool {
        (self.summary.is_some() || self.first_user_message.is_some()) && self.total_lines > 0
    }
}

/// Single-session view returned to a viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDetail {
    pub id: SessionId,
    pub external_id: String,
    pub custom_title: Option<String>,
    pub suggested_title: Option<String>,
    pub summary: Option<String>,
    pub first_user_message: Option<String>,
    pub first_seen: i64,
    pub git: GitInfo,
    pub last_sync_at: Option<i64>,
    pub file_count: i64,
    pub total_lines: i64,
    pub github_prs: Vec<String>,
    pub github_commits: Vec<String>,
    pub is_owner: bool,
    pub access_type: AccessType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_by_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// One row of a session list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionListItem {
    pub id: SessionId,
    pub external_id: String,
    pub first_seen: i64,
    pub last_activity_at: Option<i64>,
    pub file_count: i64,
    pub total_lines: i64,
    pub custom_title: Option<String>,
    pub suggested_title: Option<String>,
    pub summary: Option<String>,
    pub first_user_message: Option<String>,
    pub session_type: String,
    pub git_repo: Option<String>,
    pub git_repo_url: Option<String>,
    pub git_branch: Option<String>,
    pub github_prs: Vec<String>,
    pub github_commits: Vec<String>,
    pub is_owner: bool,
    pub access_type: AccessType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_by_email: Option<String>,
    pub owner_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl SessionListItem {
    /// Sort key matching [`Session::sort_key`].
    pub fn sort_key(&self) -> (i64, SessionId) {
        (self.last_activity_at.unwrap_or(self.first_seen), self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_repo_name() {
        assert_eq!(
            extract_repo_name("https://github.com/acme/widgets.git"),
            "acme/widgets"
        );
        assert_eq!(extract_repo_name("https://github.com/acme/widgets"), "acme/widgets");
        assert_eq!(extract_repo_name("git@github.com:acme/widgets.git"), "acme/widgets");
        assert_eq!(extract_repo_name("widgets"), "widgets");
    }

    #[test]
    fn test_materialized() {
        let mut s = Session::new(UserId(1), "ext", 10);
        assert!(!s.is_materialized());
        s.summary = Some("hello".into());
        assert!(!s.is_materialized());
        s.total_lines = 3;
        assert!(s.is_materialized());
        s.summary = None;
        s.first_user_message = Some("hi".into());
        assert!(s.is_materialized());
    }

    #[test]
    fn test_activity_time_falls_back_to_first_seen() {
        let mut s = Session::new(UserId(1), "ext", 10);
        assert_eq!(s.activity_time(), 10);
        s.last_activity_at = Some(20);
        assert_eq!(s.activity_time(), 20);
    }

    #[test]
    fn test_github_link_labels() {
        let link = GithubLink::Commit("abc123".into());
        let back = GithubLink::from_parts(link.kind_label(), link.reference()).unwrap();
        assert_eq!(back, link);
        assert!(GithubLink::from_parts("issue", "1").is_err());
    }

    #[test]
    fn test_user_status_labels() {
        assert_eq!("inactive".parse::<UserStatus>().unwrap(), UserStatus::Inactive);
        assert!("banned".parse::<UserStatus>().is_err());
    }
}
