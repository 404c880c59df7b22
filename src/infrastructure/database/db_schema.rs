use super::connection::Database;

pub fn initialize_schema(db: &Database) -> anyhow::Result<()> {
    let conn = db.get_conn()?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            repository_id TEXT NOT NULL,
            display_name TEXT,
            branch TEXT NOT NULL,
            base_branch TEXT NOT NULL,
            base_commit TEXT NOT NULL,
            worktree_path TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            last_accessed_at INTEGER,
            UNIQUE(repository_id, id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_repo ON sessions(repository_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_accessed ON sessions(last_accessed_at)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS terminal_tabs (
            session_id TEXT NOT NULL,
            tab_id TEXT NOT NULL,
            worktree_path TEXT,
            branch TEXT,
            base_branch TEXT,
            tab_index INTEGER NOT NULL DEFAULT 0,
            last_focused_at INTEGER,
            PRIMARY KEY (session_id, tab_id),
            FOREIGN KEY(session_id) REFERENCES sessions(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tabs_session ON terminal_tabs(session_id)",
        [],
    )?;

    Ok(())
}
