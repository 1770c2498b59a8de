//! Owner-only field stripping.
//!
//! Hostname, username, working directory and transcript path never leave the
//! process for anyone but the owner. Both projections are built here so the
//! rule lives in one place.

use sharegate_core::{AccessInfo, AccessType, Session, SessionDetail, SessionListItem};
use sharegate_store::VisibleSession;

/// Project a session for a single-session read.
pub fn redact_detail(session: Session, access: &AccessInfo, owner_email: &str) -> SessionDetail {
    let is_owner = access.is_owner();
    let keep = |field: Option<String>| if is_owner { field } else { None };

    SessionDetail {
        id: session.id,
        external_id: session.external_id,
        custom_title: session.custom_title,
        suggested_title: session.suggested_title,
        summary: session.summary,
        first_user_message: session.first_user_message,
        first_seen: session.first_seen,
        git: session.git,
        last_sync_at: session.last_sync_at,
        file_count: session.file_count,
        total_lines: session.total_lines,
        github_prs: session.github_prs,
        github_commits: session.github_commits,
        is_owner,
        access_type: access.access_type,
        shared_by_email: (!is_owner).then(|| owner_email.to_string()),
        cwd: keep(session.cwd),
        transcript_path: keep(session.transcript_path),
        hostname: keep(session.hostname),
        username: keep(session.username),
    }
}

/// Project one listing row.
pub fn redact_list_item(row: VisibleSession) -> SessionListItem {
    let VisibleSession {
        session,
        owner_email,
        grant,
        ..
    } = row;
    let is_owner = grant.access_type == AccessType::Owner;
    let keep = |field: Option<String>| if is_owner { field } else { None };

    SessionListItem {
        id: session.id,
        git_repo: session.git.repo_name(),
        external_id: session.external_id,
        first_seen: session.first_seen,
        last_activity_at: session.last_activity_at,
        file_count: session.file_count,
        total_lines: session.total_lines,
        custom_title: session.custom_title,
        suggested_title: session.suggested_title,
        summary: session.summary,
        first_user_message: session.first_user_message,
        session_type: session.session_type,
        git_repo_url: session.git.repo_url,
        git_branch: session.git.branch,
        github_prs: session.github_prs,
        github_commits: session.github_commits,
        is_owner,
        access_type: grant.access_type,
        shared_by_email: (!is_owner).then(|| owner_email.clone()),
        owner_email,
        hostname: keep(session.hostname),
        username: keep(session.username),
    }
}
