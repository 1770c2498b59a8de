//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;
use sharegate_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 2;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    // Cascading deletes depend on this; it is per-connection.
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(version = CURRENT_VERSION, "schema migrated");
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        2 => apply_v2(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            display_name TEXT,
            status TEXT NOT NULL DEFAULT 'active',   -- 'active' | 'inactive'
            created_at INTEGER NOT NULL
        );

        CREATE TABLE sessions (
            id BLOB PRIMARY KEY,                     -- 16 random bytes
            external_id TEXT NOT NULL,
            owner_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            custom_title TEXT,
            suggested_title TEXT,
            summary TEXT,
            first_user_message TEXT,
            session_type TEXT NOT NULL,
            git_repo_url TEXT,
            git_branch TEXT,
            first_seen INTEGER NOT NULL,
            last_activity_at INTEGER,
            last_sync_at INTEGER,
            updated_at INTEGER NOT NULL,
            file_count INTEGER NOT NULL DEFAULT 0,
            total_lines INTEGER NOT NULL DEFAULT 0,
            hostname TEXT,
            username TEXT,
            cwd TEXT,
            transcript_path TEXT
        );

        CREATE TABLE session_github_links (
            session_id BLOB NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            kind TEXT NOT NULL,                      -- 'pull_request' | 'commit'
            reference TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (session_id, kind, reference)
        );

        -- Base share row; the kind is whichever side table holds the id.
        CREATE TABLE shares (
            id BLOB PRIMARY KEY,                     -- 16 random bytes
            session_id BLOB NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            expires_at INTEGER,                      -- NULL = never
            created_at INTEGER NOT NULL,
            last_accessed_at INTEGER
        );

        CREATE TABLE share_public (
            share_id BLOB PRIMARY KEY REFERENCES shares(id) ON DELETE CASCADE
        );

        CREATE TABLE share_system (
            share_id BLOB PRIMARY KEY REFERENCES shares(id) ON DELETE CASCADE
        );

        CREATE TABLE share_recipients (
            share_id BLOB NOT NULL REFERENCES shares(id) ON DELETE CASCADE,
            email TEXT NOT NULL COLLATE NOCASE,
            user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
            UNIQUE(share_id, email)
        );

        CREATE INDEX idx_sessions_owner ON sessions(owner_id, external_id);
        CREATE INDEX idx_shares_session ON shares(session_id);
        CREATE INDEX idx_share_recipients_user ON share_recipients(user_id);
        CREATE INDEX idx_share_recipients_email ON share_recipients(email);
        "#,
    )?;

    Ok(())
}

/// Migration v2: single-row visibility stamp.
fn apply_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE visibility_stamp (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            changed_at INTEGER NOT NULL
        );
        INSERT INTO visibility_stamp (id, changed_at) VALUES (1, 0);

        CREATE INDEX idx_shares_expires ON shares(expires_at);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "users",
            "sessions",
            "session_github_links",
            "shares",
            "share_public",
            "share_system",
            "share_recipients",
            "visibility_stamp",
            "schema_migrations",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM visibility_stamp", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        let on: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(on, 1);
    }
}
