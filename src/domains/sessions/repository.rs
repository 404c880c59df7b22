use crate::domains::sessions::db_sessions::SessionMethods;
use crate::domains::sessions::db_tabs::TabMethods;
use crate::domains::sessions::entity::{Session, TerminalTab};
use crate::infrastructure::database::Database;
use anyhow::{Result, anyhow};

/// Thin registry facade over the database: every call gets a uniform error
/// context so callers never see raw sqlite failures.
#[derive(Clone)]
pub struct SessionDbManager {
    pub db: Database,
}

impl SessionDbManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn create_session(&self, session: &Session) -> Result<()> {
        self.db
            .create_session(session)
            .map_err(|e| anyhow!("Failed to create session in registry: {e}"))
    }

    pub fn get_session(&self, repo_id: &str, id: &str) -> Result<Option<Session>> {
        self.db
            .get_session(repo_id, id)
            .map_err(|e| anyhow!("Failed to get session '{id}': {e}"))
    }

    pub fn list_sessions(&self, repo_id: &str) -> Result<Vec<Session>> {
        self.db
            .list_sessions(repo_id)
            .map_err(|e| anyhow!("Failed to list sessions for '{repo_id}': {e}"))
    }

    pub fn update_display_name(&self, id: &str, display_name: &str) -> Result<()> {
        self.db
            .update_session_display_name(id, display_name)
            .map_err(|e| anyhow!("Failed to rename session '{id}': {e}"))
    }

    /// Best-effort access bump; errors are logged, never propagated.
    pub fn touch_session(&self, id: &str) {
        if let Err(e) = self.db.touch_session(id) {
            log::warn!("Failed to bump last_accessed_at for '{id}': {e}");
        }
    }

    pub fn delete_session(&self, id: &str) -> Result<bool> {
        self.db
            .delete_session(id)
            .map_err(|e| anyhow!("Failed to delete session '{id}': {e}"))
    }

    pub fn create_tab(&self, tab: &TerminalTab) -> Result<()> {
        self.db
            .create_tab(tab)
            .map_err(|e| anyhow!("Failed to create tab '{}': {e}", tab.tab_id))
    }

    pub fn get_tab(&self, session_id: &str, tab_id: &str) -> Result<Option<TerminalTab>> {
        self.db
            .get_tab(session_id, tab_id)
            .map_err(|e| anyhow!("Failed to get tab '{tab_id}': {e}"))
    }

    pub fn list_tabs(&self, session_id: &str) -> Result<Vec<TerminalTab>> {
        self.db
            .list_tabs(session_id)
            .map_err(|e| anyhow!("Failed to list tabs for '{session_id}': {e}"))
    }

    pub fn next_tab_index(&self, session_id: &str) -> Result<i32> {
        self.db
            .next_tab_index(session_id)
            .map_err(|e| anyhow!("Failed to compute tab index for '{session_id}': {e}"))
    }

    pub fn touch_tab(&self, session_id: &str, tab_id: &str) {
        if let Err(e) = self.db.touch_tab(session_id, tab_id) {
            log::warn!("Failed to bump last_focused_at for tab '{tab_id}': {e}");
        }
    }

    pub fn delete_tab(&self, session_id: &str, tab_id: &str) -> Result<bool> {
        self.db
            .delete_tab(session_id, tab_id)
            .map_err(|e| anyhow!("Failed to delete tab '{tab_id}': {e}"))
    }
}
