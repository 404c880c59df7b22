use crate::domains::sessions::entity::Session;
use crate::infrastructure::database::Database;
use crate::infrastructure::database::timestamps::{
    utc_from_epoch_seconds_lossy, utc_from_epoch_seconds_lossy_opt,
};
use anyhow::Result;
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};
use std::path::PathBuf;

pub trait SessionMethods {
    fn create_session(&self, session: &Session) -> Result<()>;
    fn get_session(&self, repo_id: &str, id: &str) -> Result<Option<Session>>;
    fn list_sessions(&self, repo_id: &str) -> Result<Vec<Session>>;
    fn update_session_display_name(&self, id: &str, display_name: &str) -> Result<()>;
    fn touch_session(&self, id: &str) -> Result<()>;
    fn delete_session(&self, id: &str) -> Result<bool>;
}

impl SessionMethods for Database {
    fn create_session(&self, session: &Session) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO sessions (
                id, repository_id, display_name, branch, base_branch,
                base_commit, worktree_path, created_at, updated_at, last_accessed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                session.id,
                session.repository_id,
                session.display_name,
                session.branch,
                session.base_branch,
                session.base_commit,
                session.worktree_path.to_string_lossy(),
                session.created_at.timestamp(),
                session.updated_at.timestamp(),
                session.last_accessed_at.map(|ts| ts.timestamp()),
            ],
        )?;
        Ok(())
    }

    fn get_session(&self, repo_id: &str, id: &str) -> Result<Option<Session>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, repository_id, display_name, branch, base_branch,
                    base_commit, worktree_path, created_at, updated_at, last_accessed_at
             FROM sessions
             WHERE repository_id = ?1 AND id = ?2",
        )?;
        let session = stmt
            .query_row(params![repo_id, id], row_to_session)
            .optional()?;
        Ok(session)
    }

    fn list_sessions(&self, repo_id: &str) -> Result<Vec<Session>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, repository_id, display_name, branch, base_branch,
                    base_commit, worktree_path, created_at, updated_at, last_accessed_at
             FROM sessions
             WHERE repository_id = ?1
             ORDER BY last_accessed_at DESC, created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map(params![repo_id], row_to_session)?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }

    fn update_session_display_name(&self, id: &str, display_name: &str) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE sessions SET display_name = ?1, updated_at = ?2 WHERE id = ?3",
            params![display_name, Utc::now().timestamp(), id],
        )?;
        Ok(())
    }

    fn touch_session(&self, id: &str) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE sessions SET last_accessed_at = ?1 WHERE id = ?2",
            params![Utc::now().timestamp(), id],
        )?;
        Ok(())
    }

    fn delete_session(&self, id: &str) -> Result<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        repository_id: row.get(1)?,
        display_name: row.get(2)?,
        branch: row.get(3)?,
        base_branch: row.get(4)?,
        base_commit: row.get(5)?,
        worktree_path: PathBuf::from(row.get::<_, String>(6)?),
        created_at: utc_from_epoch_seconds_lossy(row.get(7)?),
        updated_at: utc_from_epoch_seconds_lossy(row.get(8)?),
        last_accessed_at: utc_from_epoch_seconds_lossy_opt(row.get(9)?),
    })
}
