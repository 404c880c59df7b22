use crate::domains::sessions::entity::TerminalTab;
use crate::infrastructure::database::Database;
use crate::infrastructure::database::timestamps::utc_from_epoch_seconds_lossy_opt;
use anyhow::Result;
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};
use std::path::PathBuf;

pub trait TabMethods {
    fn create_tab(&self, tab: &TerminalTab) -> Result<()>;
    fn get_tab(&self, session_id: &str, tab_id: &str) -> Result<Option<TerminalTab>>;
    fn list_tabs(&self, session_id: &str) -> Result<Vec<TerminalTab>>;
    fn next_tab_index(&self, session_id: &str) -> Result<i32>;
    fn touch_tab(&self, session_id: &str, tab_id: &str) -> Result<()>;
    fn delete_tab(&self, session_id: &str, tab_id: &str) -> Result<bool>;
}

impl TabMethods for Database {
    fn create_tab(&self, tab: &TerminalTab) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO terminal_tabs (
                session_id, tab_id, worktree_path, branch, base_branch,
                tab_index, last_focused_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                tab.session_id,
                tab.tab_id,
                tab.worktree_path.as_ref().map(|p| p.to_string_lossy().to_string()),
                tab.branch,
                tab.base_branch,
                tab.index,
                tab.last_focused_at.map(|ts| ts.timestamp()),
            ],
        )?;
        Ok(())
    }

    fn get_tab(&self, session_id: &str, tab_id: &str) -> Result<Option<TerminalTab>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, tab_id, worktree_path, branch, base_branch,
                    tab_index, last_focused_at
             FROM terminal_tabs
             WHERE session_id = ?1 AND tab_id = ?2",
        )?;
        let tab = stmt
            .query_row(params![session_id, tab_id], row_to_tab)
            .optional()?;
        Ok(tab)
    }

    fn list_tabs(&self, session_id: &str) -> Result<Vec<TerminalTab>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, tab_id, worktree_path, branch, base_branch,
                    tab_index, last_focused_at
             FROM terminal_tabs
             WHERE session_id = ?1
             ORDER BY tab_index ASC",
        )?;
        let rows = stmt.query_map(params![session_id], row_to_tab)?;
        let mut tabs = Vec::new();
        for row in rows {
            tabs.push(row?);
        }
        Ok(tabs)
    }

    fn next_tab_index(&self, session_id: &str) -> Result<i32> {
        let conn = self.get_conn()?;
        let max: Option<i32> = conn.query_row(
            "SELECT MAX(tab_index) FROM terminal_tabs WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(max.map_or(0, |m| m + 1))
    }

    fn touch_tab(&self, session_id: &str, tab_id: &str) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE terminal_tabs SET last_focused_at = ?1
             WHERE session_id = ?2 AND tab_id = ?3",
            params![Utc::now().timestamp(), session_id, tab_id],
        )?;
        Ok(())
    }

    fn delete_tab(&self, session_id: &str, tab_id: &str) -> Result<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM terminal_tabs WHERE session_id = ?1 AND tab_id = ?2",
            params![session_id, tab_id],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_tab(row: &Row<'_>) -> rusqlite::Result<TerminalTab> {
    Ok(TerminalTab {
        session_id: row.get(0)?,
        tab_id: row.get(1)?,
        worktree_path: row.get::<_, Option<String>>(2)?.map(PathBuf::from),
        branch: row.get(3)?,
        base_branch: row.get(4)?,
        index: row.get(5)?,
        last_focused_at: utc_from_epoch_seconds_lossy_opt(row.get(6)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::sessions::db_sessions::SessionMethods;
    use crate::domains::sessions::entity::Session;

    fn seed_session(db: &Database, id: &str) {
        let now = Utc::now();
        db.create_session(&Session {
            id: id.to_string(),
            repository_id: "demo".to_string(),
            display_name: None,
            branch: format!("werft/{id}"),
            base_branch: "main".to_string(),
            base_commit: "deadbeefdeadbeefdeadbeefdeadbeefdeadbeef".to_string(),
            worktree_path: PathBuf::from(format!("/tmp/{id}")),
            created_at: now,
            updated_at: now,
            last_accessed_at: None,
        })
        .unwrap();
    }

    fn sample_tab(session_id: &str, tab_id: &str, index: i32) -> TerminalTab {
        TerminalTab {
            session_id: session_id.to_string(),
            tab_id: tab_id.to_string(),
            worktree_path: None,
            branch: None,
            base_branch: None,
            index,
            last_focused_at: None,
        }
    }

    #[test]
    fn tabs_round_trip_and_order_by_index() {
        let db = Database::new(None).unwrap();
        seed_session(&db, "s1");

        db.create_tab(&sample_tab("s1", "second", 1)).unwrap();
        db.create_tab(&sample_tab("s1", "first", 0)).unwrap();

        let tabs = db.list_tabs("s1").unwrap();
        assert_eq!(tabs.len(), 2);
        assert_eq!(tabs[0].tab_id, "first");
        assert_eq!(tabs[1].tab_id, "second");
        assert_eq!(db.next_tab_index("s1").unwrap(), 2);
    }

    #[test]
    fn next_index_starts_at_zero() {
        let db = Database::new(None).unwrap();
        seed_session(&db, "s2");
        assert_eq!(db.next_tab_index("s2").unwrap(), 0);
    }

    #[test]
    fn tabs_cascade_with_session_delete() {
        let db = Database::new(None).unwrap();
        seed_session(&db, "s3");
        db.create_tab(&sample_tab("s3", "t", 0)).unwrap();

        db.delete_session("s3").unwrap();
        assert!(db.get_tab("s3", "t").unwrap().is_none());
    }

    #[test]
    fn tab_without_session_is_rejected() {
        let db = Database::new(None).unwrap();
        assert!(db.create_tab(&sample_tab("ghost", "t", 0)).is_err());
    }
}
