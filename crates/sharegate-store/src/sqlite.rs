//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for sharegate. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Params, Row};

use sharegate_core::{
    AccessGrant, AccessType, GitInfo, GithubLink, NewShare, Recipient, Session, SessionId, Share,
    ShareId, ShareKind, ShareWithSession, User, UserId, UserStatus, Viewer, ID_LEN,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{validate_expiry, validate_new_share, Store, VisibleSession};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row decoding
// ─────────────────────────────────────────────────────────────────────────────

const USER_COLUMNS: &str = "id, email, display_name, status, created_at";

/// Session columns in the order `row_to_session` reads them.
const SESSION_COLUMNS: &str = "s.id, s.external_id, s.owner_id, s.custom_title, \
     s.suggested_title, s.summary, s.first_user_message, s.session_type, s.git_repo_url, \
     s.git_branch, s.first_seen, s.last_activity_at, s.last_sync_at, s.updated_at, \
     s.file_count, s.total_lines, s.hostname, s.username, s.cwd, s.transcript_path";

/// Number of columns in [`SESSION_COLUMNS`].
const SESSION_WIDTH: usize = 20;

const SHARE_SELECT: &str = "SELECT sh.id, sh.session_id, sh.expires_at, sh.created_at, \
     sh.last_accessed_at, \
     CASE WHEN EXISTS (SELECT 1 FROM share_public p WHERE p.share_id = sh.id) THEN 'public' \
          WHEN EXISTS (SELECT 1 FROM share_system y WHERE y.share_id = sh.id) THEN 'system' \
          ELSE 'recipient' END AS kind \
     FROM shares sh";

fn blob_to_id(row: &Row<'_>, idx: usize) -> rusqlite::Result<[u8; ID_LEN]> {
    let bytes: Vec<u8> = row.get(idx)?;
    bytes
        .try_into()
        .map_err(|_| rusqlite::Error::InvalidColumnType(idx, "id".into(), Type::Blob))
}

fn parse_label<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = sharegate_core::CoreError>,
{
    let label: String = row.get(idx)?;
    label
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        email: row.get(1)?,
        display_name: row.get(2)?,
        status: parse_label(row, 3)?,
        created_at: row.get(4)?,
    })
}

/// Decode a session from the first [`SESSION_WIDTH`] columns. Links are
/// loaded separately.
fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: SessionId(blob_to_id(row, 0)?),
        external_id: row.get(1)?,
        owner_id: UserId(row.get(2)?),
        custom_title: row.get(3)?,
        suggested_title: row.get(4)?,
        summary: row.get(5)?,
        first_user_message: row.get(6)?,
        session_type: row.get(7)?,
        git: GitInfo {
            repo_url: row.get(8)?,
            branch: row.get(9)?,
        },
        first_seen: row.get(10)?,
        last_activity_at: row.get(11)?,
        last_sync_at: row.get(12)?,
        updated_at: row.get(13)?,
        file_count: row.get(14)?,
        total_lines: row.get(15)?,
        github_prs: Vec::new(),
        github_commits: Vec::new(),
        hostname: row.get(16)?,
        username: row.get(17)?,
        cwd: row.get(18)?,
        transcript_path: row.get(19)?,
    })
}

/// Session columns followed by owner email, owner status, share id, share
/// created_at and the grant's access type.
fn row_to_visible(row: &Row<'_>) -> rusqlite::Result<VisibleSession> {
    let session = row_to_session(row)?;
    let owner_email: String = row.get(SESSION_WIDTH)?;
    let owner_status: UserStatus = parse_label(row, SESSION_WIDTH + 1)?;
    let share_id: Option<Vec<u8>> = row.get(SESSION_WIDTH + 2)?;
    let created_at: i64 = row.get(SESSION_WIDTH + 3)?;
    let access_type: AccessType = parse_label(row, SESSION_WIDTH + 4)?;

    let grant = match share_id {
        Some(bytes) => {
            let id: [u8; ID_LEN] = bytes.try_into().map_err(|_| {
                rusqlite::Error::InvalidColumnType(SESSION_WIDTH + 2, "share_id".into(), Type::Blob)
            })?;
            AccessGrant::via_share(access_type, ShareId(id), created_at)
        }
        None if access_type == AccessType::Owner => AccessGrant::owner(),
        None => AccessGrant::synthetic(access_type),
    };

    Ok(VisibleSession {
        session,
        owner_email,
        owner_status,
        grant,
    })
}

fn load_links(conn: &Connection, session: &mut Session) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "SELECT kind, reference FROM session_github_links
         WHERE session_id = ?1 ORDER BY created_at ASC, rowid ASC",
    )?;
    let rows = stmt
        .query_map(params![session.id.as_bytes().as_slice()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    session.github_prs.clear();
    session.github_commits.clear();
    for (kind, reference) in rows {
        match GithubLink::from_parts(&kind, reference)? {
            GithubLink::PullRequest(pr) => session.github_prs.push(pr),
            GithubLink::Commit(sha) => session.github_commits.push(sha),
        }
    }
    session.github_commits.reverse();
    Ok(())
}

fn query_sessions<P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<VisibleSession>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt
        .query_map(params, row_to_visible)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    for row in &mut rows {
        load_links(conn, &mut row.session)?;
    }
    Ok(rows)
}

/// Base share row before its kind is attached.
struct ShareRow {
    id: ShareId,
    session_id: SessionId,
    expires_at: Option<i64>,
    created_at: i64,
    last_accessed_at: Option<i64>,
    kind: String,
}

fn row_to_share(row: &Row<'_>) -> rusqlite::Result<ShareRow> {
    Ok(ShareRow {
        id: ShareId(blob_to_id(row, 0)?),
        session_id: SessionId(blob_to_id(row, 1)?),
        expires_at: row.get(2)?,
        created_at: row.get(3)?,
        last_accessed_at: row.get(4)?,
        kind: row.get(5)?,
    })
}

fn load_recipients(conn: &Connection, share_id: &ShareId) -> Result<Vec<Recipient>> {
    let mut stmt = conn.prepare_cached(
        "SELECT email, user_id FROM share_recipients WHERE share_id = ?1 ORDER BY rowid",
    )?;
    let recipients = stmt
        .query_map(params![share_id.as_bytes().as_slice()], |row| {
            Ok(Recipient {
                email: row.get(0)?,
                user_id: row.get::<_, Option<i64>>(1)?.map(UserId),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(recipients)
}

/// Run `SHARE_SELECT` with a trailing clause and attach each share's kind.
fn query_shares<P: Params>(conn: &Connection, clause: &str, params: P) -> Result<Vec<Share>> {
    let sql = format!("{} {}", SHARE_SELECT, clause);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, row_to_share)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|row| {
            let kind = match row.kind.as_str() {
                "public" => ShareKind::Public,
                "system" => ShareKind::System,
                _ => ShareKind::Recipient(load_recipients(conn, &row.id)?),
            };
            Ok(Share {
                id: row.id,
                session_id: row.session_id,
                kind,
                expires_at: row.expires_at,
                created_at: row.created_at,
                last_accessed_at: row.last_accessed_at,
            })
        })
        .collect()
}

fn session_owned_by(conn: &Connection, id: &SessionId, owner_id: UserId) -> Result<bool> {
    let owned = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sessions WHERE id = ?1 AND owner_id = ?2)",
        params![id.as_bytes().as_slice(), owner_id.0],
        |row| row.get(0),
    )?;
    Ok(owned)
}

fn session_exists(conn: &Connection, id: &SessionId) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sessions WHERE id = ?1)",
        params![id.as_bytes().as_slice()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Move the visibility stamp forward to `now`. It never moves back.
fn stamp_visibility(conn: &Connection, now: i64) -> Result<()> {
    conn.execute(
        "UPDATE visibility_stamp SET changed_at = MAX(changed_at, ?1) WHERE id = 1",
        params![now],
    )?;
    Ok(())
}

fn insert_share_row(
    conn: &Connection,
    id: &ShareId,
    session_id: &SessionId,
    expires_at: Option<i64>,
    now: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO shares (id, session_id, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            id.as_bytes().as_slice(),
            session_id.as_bytes().as_slice(),
            expires_at,
            now
        ],
    )?;
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_user(
        &self,
        email: &str,
        display_name: Option<&str>,
        now: i64,
    ) -> Result<User> {
        let email = email.trim().to_string();
        let display_name = display_name.map(str::to_string);

        self.run(move |conn| {
            let tx = conn.transaction()?;

            let taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                params![email],
                |row| row.get(0),
            )?;
            if taken {
                return Err(StoreError::InvalidInput(format!(
                    "email already registered: {}",
                    email
                )));
            }

            tx.execute(
                "INSERT INTO users (email, display_name, status, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![email, display_name, UserStatus::Active.as_str(), now],
            )?;
            let id = UserId(tx.last_insert_rowid());

            // share_recipients.email is NOCASE, so this matches case-insensitively.
            let resolved = tx.execute(
                "UPDATE share_recipients SET user_id = ?1 WHERE user_id IS NULL AND email = ?2",
                params![id.0, email],
            )?;
            tx.commit()?;

            if resolved > 0 {
                tracing::debug!(user_id = %id, resolved, "bound pending invites to new user");
            }

            Ok(User {
                id,
                email,
                display_name,
                status: UserStatus::Active,
                created_at: now,
            })
        })
        .await
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.run(move |conn| {
            let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
            conn.query_row(&sql, params![id.0], row_to_user)
                .optional()
                .map_err(StoreError::from)
        })
        .await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.trim().to_string();
        self.run(move |conn| {
            let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
            conn.query_row(&sql, params![email], row_to_user)
                .optional()
                .map_err(StoreError::from)
        })
        .await
    }

    async fn set_user_status(&self, id: UserId, status: UserStatus, now: i64) -> Result<()> {
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let updated = tx.execute(
                "UPDATE users SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id.0],
            )?;
            if updated == 0 {
                return Err(StoreError::UserNotFound(id));
            }
            stamp_visibility(&tx, now)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn upsert_session(&self, session: &Session) -> Result<()> {
        let session = session.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;

            let owner_exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
                params![session.owner_id.0],
                |row| row.get(0),
            )?;
            if !owner_exists {
                return Err(StoreError::UserNotFound(session.owner_id));
            }

            let id = session.id.as_bytes().as_slice();
            let written = tx.execute(
                "INSERT INTO sessions (
                    id, external_id, owner_id, custom_title, suggested_title, summary,
                    first_user_message, session_type, git_repo_url, git_branch, first_seen,
                    last_activity_at, last_sync_at, updated_at, file_count, total_lines,
                    hostname, username, cwd, transcript_path
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                          ?16, ?17, ?18, ?19, ?20)
                ON CONFLICT(id) DO UPDATE SET
                    external_id = excluded.external_id,
                    custom_title = excluded.custom_title,
                    suggested_title = excluded.suggested_title,
                    summary = excluded.summary,
                    first_user_message = excluded.first_user_message,
                    session_type = excluded.session_type,
                    git_repo_url = excluded.git_repo_url,
                    git_branch = excluded.git_branch,
                    first_seen = excluded.first_seen,
                    last_activity_at = excluded.last_activity_at,
                    last_sync_at = excluded.last_sync_at,
                    updated_at = excluded.updated_at,
                    file_count = excluded.file_count,
                    total_lines = excluded.total_lines,
                    hostname = excluded.hostname,
                    username = excluded.username,
                    cwd = excluded.cwd,
                    transcript_path = excluded.transcript_path
                WHERE sessions.owner_id = excluded.owner_id",
                params![
                    id,
                    session.external_id,
                    session.owner_id.0,
                    session.custom_title,
                    session.suggested_title,
                    session.summary,
                    session.first_user_message,
                    session.session_type,
                    session.git.repo_url,
                    session.git.branch,
                    session.first_seen,
                    session.last_activity_at,
                    session.last_sync_at,
                    session.updated_at,
                    session.file_count,
                    session.total_lines,
                    session.hostname,
                    session.username,
                    session.cwd,
                    session.transcript_path,
                ],
            )?;
            // Zero rows means the id exists under another owner.
            if written == 0 {
                return Err(StoreError::SessionNotFound(session.id));
            }

            tx.execute(
                "DELETE FROM session_github_links WHERE session_id = ?1",
                params![id],
            )?;
            {
                let mut insert = tx.prepare(
                    "INSERT OR IGNORE INTO session_github_links
                     (session_id, kind, reference, created_at) VALUES (?1, ?2, ?3, ?4)",
                )?;
                let prs = session
                    .github_prs
                    .iter()
                    .map(|pr| GithubLink::PullRequest(pr.clone()));
                // Commits are held newest first; store them oldest first.
                let commits = session
                    .github_commits
                    .iter()
                    .rev()
                    .map(|sha| GithubLink::Commit(sha.clone()));
                for link in prs.chain(commits) {
                    insert.execute(params![
                        id,
                        link.kind_label(),
                        link.reference(),
                        session.updated_at
                    ])?;
                }
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>> {
        let id = *id;
        self.run(move |conn| {
            let sql = format!("SELECT {} FROM sessions s WHERE s.id = ?1", SESSION_COLUMNS);
            let session = conn
                .query_row(&sql, params![id.as_bytes().as_slice()], row_to_session)
                .optional()?;
            match session {
                Some(mut session) => {
                    load_links(conn, &mut session)?;
                    Ok(Some(session))
                }
                None => Ok(None),
            }
        })
        .await
    }

    async fn delete_session(&self, id: &SessionId, owner_id: UserId, now: i64) -> Result<bool> {
        let id = *id;
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let deleted = tx.execute(
                "DELETE FROM sessions WHERE id = ?1 AND owner_id = ?2",
                params![id.as_bytes().as_slice(), owner_id.0],
            )?;
            if deleted > 0 {
                stamp_visibility(&tx, now)?;
            }
            tx.commit()?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn record_sync(
        &self,
        id: &SessionId,
        file_count: i64,
        total_lines: i64,
        last_activity_at: Option<i64>,
        now: i64,
    ) -> Result<()> {
        let id = *id;
        self.run(move |conn| {
            let updated = conn.execute(
                "UPDATE sessions SET
                    file_count = ?2,
                    total_lines = ?3,
                    last_activity_at = COALESCE(?4, last_activity_at),
                    last_sync_at = ?5,
                    updated_at = ?5
                 WHERE id = ?1",
                params![
                    id.as_bytes().as_slice(),
                    file_count,
                    total_lines,
                    last_activity_at,
                    now
                ],
            )?;
            if updated == 0 {
                return Err(StoreError::SessionNotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn add_github_link(&self, id: &SessionId, link: &GithubLink, now: i64) -> Result<()> {
        let id = *id;
        let link = link.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            if !session_exists(&tx, &id)? {
                return Err(StoreError::SessionNotFound(id));
            }
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO session_github_links
                 (session_id, kind, reference, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id.as_bytes().as_slice(), link.kind_label(), link.reference(), now],
            )?;
            if inserted > 0 {
                tx.execute(
                    "UPDATE sessions SET updated_at = ?2 WHERE id = ?1",
                    params![id.as_bytes().as_slice(), now],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
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
        let session_id = *session_id;
        let is_public = matches!(share, NewShare::Public);

        self.run(move |conn| {
            let tx = conn.transaction()?;
            if !session_owned_by(&tx, &session_id, owner_id)? {
                return Err(StoreError::SessionNotFound(session_id));
            }

            let id = ShareId::generate();
            insert_share_row(&tx, &id, &session_id, expires_at, now)?;

            let kind = if is_public {
                tx.execute(
                    "INSERT INTO share_public (share_id) VALUES (?1)",
                    params![id.as_bytes().as_slice()],
                )?;
                ShareKind::Public
            } else {
                let mut recipients = Vec::with_capacity(emails.len());
                {
                    let mut lookup = tx.prepare("SELECT id FROM users WHERE email = ?1")?;
                    let mut insert = tx.prepare(
                        "INSERT INTO share_recipients (share_id, email, user_id)
                         VALUES (?1, ?2, ?3)",
                    )?;
                    for email in emails {
                        let user_id: Option<i64> = lookup
                            .query_row(params![email], |row| row.get(0))
                            .optional()?;
                        insert.execute(params![id.as_bytes().as_slice(), email, user_id])?;
                        recipients.push(Recipient {
                            email,
                            user_id: user_id.map(UserId),
                        });
                    }
                }
                ShareKind::Recipient(recipients)
            };

            tx.commit()?;
            Ok(Share {
                id,
                session_id,
                kind,
                expires_at,
                created_at: now,
                last_accessed_at: None,
            })
        })
        .await
    }

    async fn create_system_share(
        &self,
        session_id: &SessionId,
        expires_at: Option<i64>,
        now: i64,
    ) -> Result<Share> {
        validate_expiry(expires_at, now)?;
        let session_id = *session_id;

        self.run(move |conn| {
            let tx = conn.transaction()?;
            if !session_exists(&tx, &session_id)? {
                return Err(StoreError::SessionNotFound(session_id));
            }
            let id = ShareId::generate();
            insert_share_row(&tx, &id, &session_id, expires_at, now)?;
            tx.execute(
                "INSERT INTO share_system (share_id) VALUES (?1)",
                params![id.as_bytes().as_slice()],
            )?;
            tx.commit()?;
            Ok(Share {
                id,
                session_id,
                kind: ShareKind::System,
                expires_at,
                created_at: now,
                last_accessed_at: None,
            })
        })
        .await
    }

    async fn revoke_share(&self, share_id: &ShareId, owner_id: UserId, now: i64) -> Result<()> {
        let share_id = *share_id;
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let deleted = tx.execute(
                "DELETE FROM shares WHERE id = ?1
                 AND session_id IN (SELECT id FROM sessions WHERE owner_id = ?2)",
                params![share_id.as_bytes().as_slice(), owner_id.0],
            )?;
            if deleted == 0 {
                return Err(StoreError::Unauthorized);
            }
            stamp_visibility(&tx, now)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_share(&self, share_id: &ShareId) -> Result<Option<Share>> {
        let share_id = *share_id;
        self.run(move |conn| {
            let mut shares = query_shares(
                conn,
                "WHERE sh.id = ?1",
                params![share_id.as_bytes().as_slice()],
            )?;
            Ok(shares.pop())
        })
        .await
    }

    async fn list_shares(&self, session_id: &SessionId, owner_id: UserId) -> Result<Vec<Share>> {
        let session_id = *session_id;
        self.run(move |conn| {
            if !session_owned_by(conn, &session_id, owner_id)? {
                return Err(StoreError::SessionNotFound(session_id));
            }
            query_shares(
                conn,
                "WHERE sh.session_id = ?1 ORDER BY sh.created_at DESC, sh.rowid DESC",
                params![session_id.as_bytes().as_slice()],
            )
        })
        .await
    }

    async fn list_all_user_shares(&self, owner_id: UserId) -> Result<Vec<ShareWithSession>> {
        self.run(move |conn| {
            let shares = query_shares(
                conn,
                "JOIN sessions s ON s.id = sh.session_id WHERE s.owner_id = ?1
                 ORDER BY sh.created_at DESC, sh.rowid DESC",
                params![owner_id.0],
            )?;

            let mut sessions: HashMap<SessionId, (String, Option<String>, Option<String>)> =
                HashMap::new();
            let mut out = Vec::with_capacity(shares.len());
            for share in shares {
                if !sessions.contains_key(&share.session_id) {
                    let info = conn.query_row(
                        "SELECT external_id, summary, first_user_message
                         FROM sessions WHERE id = ?1",
                        params![share.session_id.as_bytes().as_slice()],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                    )?;
                    sessions.insert(share.session_id, info);
                }
                let (external_id, summary, first_message) = sessions
                    .get(&share.session_id)
                    .cloned()
                    .unwrap_or_default();
                out.push(ShareWithSession {
                    share,
                    external_id,
                    session_summary: summary,
                    session_first_user_message: first_message,
                });
            }
            Ok(out)
        })
        .await
    }

    async fn shares_for_session(&self, session_id: &SessionId) -> Result<Vec<Share>> {
        let session_id = *session_id;
        self.run(move |conn| {
            query_shares(
                conn,
                "WHERE sh.session_id = ?1",
                params![session_id.as_bytes().as_slice()],
            )
        })
        .await
    }

    async fn touch_share(&self, share_id: &ShareId, now: i64) -> Result<()> {
        let share_id = *share_id;
        self.run(move |conn| {
            conn.execute(
                "UPDATE shares SET last_accessed_at = ?2 WHERE id = ?1",
                params![share_id.as_bytes().as_slice(), now],
            )?;
            Ok(())
        })
        .await
    }

    async fn owned_sessions(&self, owner_id: UserId) -> Result<Vec<VisibleSession>> {
        self.run(move |conn| {
            let sql = format!(
                "SELECT {}, u.email, u.status, NULL, 0, 'owner'
                 FROM sessions s JOIN users u ON u.id = s.owner_id
                 WHERE s.owner_id = ?1",
                SESSION_COLUMNS
            );
            query_sessions(conn, &sql, params![owner_id.0])
        })
        .await
    }

    async fn shared_sessions(&self, viewer: &Viewer, now: i64) -> Result<Vec<VisibleSession>> {
        let viewer = viewer.clone();
        self.run(move |conn| {
            let sql = format!(
                "SELECT {cols}, u.email, u.status, sh.id, sh.created_at, 'recipient'
                 FROM shares sh
                 JOIN share_recipients r ON r.share_id = sh.id
                 JOIN sessions s ON s.id = sh.session_id
                 JOIN users u ON u.id = s.owner_id
                 WHERE s.owner_id != ?1
                   AND (sh.expires_at IS NULL OR sh.expires_at > ?3)
                   AND (r.user_id = ?1 OR LOWER(r.email) = LOWER(?2))
                 UNION ALL
                 SELECT {cols}, u.email, u.status, sh.id, sh.created_at, 'system'
                 FROM shares sh
                 JOIN share_system y ON y.share_id = sh.id
                 JOIN sessions s ON s.id = sh.session_id
                 JOIN users u ON u.id = s.owner_id
                 WHERE s.owner_id != ?1
                   AND (sh.expires_at IS NULL OR sh.expires_at > ?3)",
                cols = SESSION_COLUMNS
            );
            query_sessions(
                conn,
                &sql,
                params![viewer.user_id.0, viewer.email.trim(), now],
            )
        })
        .await
    }

    async fn sessions_not_owned_by(&self, viewer_id: UserId) -> Result<Vec<VisibleSession>> {
        self.run(move |conn| {
            let sql = format!(
                "SELECT {}, u.email, u.status, NULL, 0, 'system'
                 FROM sessions s JOIN users u ON u.id = s.owner_id
                 WHERE s.owner_id != ?1",
                SESSION_COLUMNS
            );
            query_sessions(conn, &sql, params![viewer_id.0])
        })
        .await
    }

    async fn visibility_changed_at(&self, now: i64) -> Result<i64> {
        self.run(move |conn| {
            let changed_at = conn.query_row(
                "SELECT MAX(
                    (SELECT changed_at FROM visibility_stamp WHERE id = 1),
                    COALESCE((SELECT MAX(expires_at) FROM shares WHERE expires_at <= ?1), 0)
                 )",
                params![now],
                |row| row.get(0),
            )?;
            Ok(changed_at)
        })
        .await
    }
}
