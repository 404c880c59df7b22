use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Durable registry record for one isolated coding session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    pub repository_id: String,
    pub display_name: Option<String>,
    pub branch: String,
    pub base_branch: String,
    pub base_commit: String,
    pub worktree_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

/// Terminal tab scoped to a session. A tab with `worktree_path: None` runs
/// in the parent session's working copy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TerminalTab {
    pub session_id: String,
    pub tab_id: String,
    pub worktree_path: Option<PathBuf>,
    pub branch: Option<String>,
    pub base_branch: Option<String>,
    pub index: i32,
    pub last_focused_at: Option<DateTime<Utc>>,
}

/// Result of an idempotent create: the record plus whether it already existed.
#[derive(Debug, Clone)]
pub struct CreatedSession {
    pub session: Session,
    pub is_existing: bool,
}

/// Listing payload: a session plus its computed on-disk validity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub repository_id: String,
    pub display_name: Option<String>,
    pub branch_name: String,
    pub base_branch: String,
    pub base_revision: String,
    pub working_copy_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub is_valid: bool,
}

impl SessionSummary {
    pub fn from_session(session: Session, is_valid: bool) -> Self {
        Self {
            session_id: session.id,
            repository_id: session.repository_id,
            display_name: session.display_name,
            branch_name: session.branch,
            base_branch: session.base_branch,
            base_revision: session.base_commit,
            working_copy_path: session.worktree_path,
            created_at: session.created_at,
            last_accessed_at: session.last_accessed_at,
            is_valid,
        }
    }
}
