use super::connection::Database;

pub fn initialize_schema(db: &Database) -> anyhow::Result<()> {
    let conn = db.get_conn()?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            id                TEXT PRIMARY KEY,
            title             TEXT NOT NULL,
            project_path      TEXT NOT NULL DEFAULT '',
            group_path        TEXT NOT NULL DEFAULT 'my-sessions',
            sort_order        INTEGER NOT NULL DEFAULT 0,
            command           TEXT NOT NULL DEFAULT '',
            tool              TEXT NOT NULL DEFAULT 'shell',
            status            TEXT NOT NULL DEFAULT 'idle',
            tmux_session      TEXT NOT NULL DEFAULT '',
            created_at        INTEGER NOT NULL,
            last_accessed     INTEGER NOT NULL DEFAULT 0,
            parent_session_id TEXT NOT NULL DEFAULT '',
            worktree_path     TEXT NOT NULL DEFAULT '',
            worktree_repo     TEXT NOT NULL DEFAULT '',
            worktree_branch   TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS groups (
            path         TEXT PRIMARY KEY,
            name         TEXT NOT NULL,
            expanded     INTEGER NOT NULL DEFAULT 1,
            sort_order   INTEGER NOT NULL DEFAULT 0,
            default_path TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS session_events (
            id         INTEGER PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            ts         DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            event_type TEXT NOT NULL,
            detail     TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_session_events_session_id
         ON session_events(session_id, ts DESC)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts (
            id            TEXT PRIMARY KEY,
            username      TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at    INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS refresh_tokens (
            token      TEXT PRIMARY KEY,
            account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
            expires_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS usage_snapshots (
            id                  INTEGER PRIMARY KEY,
            ts_ms               INTEGER NOT NULL,
            five_hour_util      REAL NOT NULL DEFAULT 0,
            five_hour_resets_at INTEGER NOT NULL DEFAULT 0,
            seven_day_util      REAL NOT NULL DEFAULT 0,
            seven_day_resets_at INTEGER NOT NULL DEFAULT 0,
            extra_enabled       INTEGER NOT NULL DEFAULT 0,
            extra_monthly_limit REAL NOT NULL DEFAULT 0,
            extra_used_credits  REAL NOT NULL DEFAULT 0,
            extra_utilization   REAL NOT NULL DEFAULT 0
        )",
        [],
    )?;

    apply_sessions_migrations(&conn);
    apply_groups_migrations(&conn);

    Ok(())
}

// Idempotent column additions for databases created by earlier versions.
// "duplicate column name" failures are expected and ignored.
fn apply_sessions_migrations(conn: &rusqlite::Connection) {
    let _ = conn.execute(
        "ALTER TABLE sessions ADD COLUMN repo_url TEXT NOT NULL DEFAULT ''",
        [],
    );
    let _ = conn.execute(
        "ALTER TABLE sessions ADD COLUMN acknowledged INTEGER NOT NULL DEFAULT 0",
        [],
    );
    let _ = conn.execute(
        "ALTER TABLE sessions ADD COLUMN has_uncommitted INTEGER NOT NULL DEFAULT 0",
        [],
    );
    let _ = conn.execute(
        "ALTER TABLE sessions ADD COLUMN notes TEXT NOT NULL DEFAULT ''",
        [],
    );
}

fn apply_groups_migrations(conn: &rusqlite::Connection) {
    let _ = conn.execute(
        "ALTER TABLE groups ADD COLUMN repo_url TEXT NOT NULL DEFAULT ''",
        [],
    );
    let _ = conn.execute(
        "ALTER TABLE groups ADD COLUMN default_tool TEXT NOT NULL DEFAULT ''",
        [],
    );
    let _ = conn.execute(
        "ALTER TABLE groups ADD COLUMN pre_launch_command TEXT NOT NULL DEFAULT ''",
        [],
    );
}
