use crate::domains::git::service as git;
use crate::domains::sessions::entity::Session;
use crate::domains::sessions::repository::SessionDbManager;
use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct RemovalConfig {
    pub skip_branch_deletion: bool,
}

#[derive(Debug, Clone)]
pub struct RemovalResult {
    pub worktree_removed: bool,
    pub branch_deleted: bool,
    pub errors: Vec<String>,
}

/// Tears a session's on-disk artifacts down. Every step is independently
/// tolerant of partial prior failure so cleanup converges even after crashes
/// or manual deletion; errors are collected, not propagated, except for the
/// final registry delete.
pub struct RemovalCoordinator<'a> {
    repo_path: &'a Path,
    db_manager: &'a SessionDbManager,
}

impl<'a> RemovalCoordinator<'a> {
    pub fn new(repo_path: &'a Path, db_manager: &'a SessionDbManager) -> Self {
        Self {
            repo_path,
            db_manager,
        }
    }

    pub async fn remove_session(
        &self,
        session: &Session,
        config: RemovalConfig,
    ) -> Result<RemovalResult> {
        log::info!("Removing session '{}'", session.id);

        let mut result = RemovalResult {
            worktree_removed: false,
            branch_deleted: false,
            errors: Vec::new(),
        };

        self.warn_on_uncommitted_changes(session);

        // Tab worktrees go first: they hold refs into the same repository
        for tab in self.db_manager.list_tabs(&session.id).unwrap_or_default() {
            if let (Some(wt), branch) = (tab.worktree_path.as_ref(), tab.branch.as_deref()) {
                if let Err(e) =
                    Self::remove_worktree_async(self.repo_path, wt, &session.id).await
                {
                    result.errors.push(format!("Tab worktree removal failed: {e}"));
                }
                if let Some(branch) = branch
                    && let Err(e) =
                        Self::delete_branch_async(self.repo_path, branch, &session.id).await
                {
                    result.errors.push(format!("Tab branch deletion failed: {e}"));
                }
            }
        }

        match Self::remove_worktree_async(self.repo_path, &session.worktree_path, &session.id)
            .await
        {
            Ok(()) => result.worktree_removed = true,
            Err(e) => result.errors.push(format!("Worktree removal failed: {e}")),
        }

        if !config.skip_branch_deletion {
            // The branch stays "checked out" while the worktree exists, so it
            // is deleted only after the worktree is gone.
            match Self::delete_branch_async(self.repo_path, &session.branch, &session.id).await {
                Ok(()) => result.branch_deleted = true,
                Err(e) => result.errors.push(format!("Branch deletion failed: {e}")),
            }
        }

        if let Err(e) = Self::prune_worktrees_async(self.repo_path).await {
            result.errors.push(format!("Worktree prune failed: {e}"));
        }

        self.db_manager.delete_session(&session.id)?;

        if result.errors.is_empty() {
            log::info!("Remove {}: Successfully completed", session.id);
        } else {
            log::warn!(
                "Remove {}: Completed with {} error(s)",
                session.id,
                result.errors.len()
            );
        }

        Ok(result)
    }

    /// Tear down only the stale on-disk artifacts of an invalid session,
    /// keeping nothing. Used by create-time reconciliation.
    pub async fn remove_stale_artifacts(&self, session: &Session) -> Result<()> {
        log::info!(
            "Reconciling stale session '{}': removing leftover artifacts",
            session.id
        );

        if session.worktree_path.exists()
            && let Err(e) =
                Self::remove_worktree_async(self.repo_path, &session.worktree_path, &session.id)
                    .await
        {
            log::warn!("Reconcile {}: worktree removal failed: {e}", session.id);
        }

        if let Err(e) =
            Self::delete_branch_async(self.repo_path, &session.branch, &session.id).await
        {
            log::warn!("Reconcile {}: branch deletion failed: {e}", session.id);
        }

        if let Err(e) = Self::prune_worktrees_async(self.repo_path).await {
            log::warn!("Reconcile {}: prune failed: {e}", session.id);
        }

        self.db_manager.delete_session(&session.id)?;
        Ok(())
    }

    fn warn_on_uncommitted_changes(&self, session: &Session) {
        if !session.worktree_path.exists() {
            return;
        }

        let has_uncommitted =
            git::has_uncommitted_changes(&session.worktree_path).unwrap_or(false);
        if has_uncommitted {
            log::warn!("Removing session '{}' with uncommitted changes", session.id);
        }
    }

    async fn remove_worktree_async(
        repo_path: &Path,
        worktree_path: &Path,
        session_id: &str,
    ) -> Result<()> {
        if !worktree_path.exists() {
            log::warn!(
                "Remove {session_id}: Worktree path missing, skipping removal: {}",
                worktree_path.display()
            );
            return Ok(());
        }

        let repo_path = repo_path.to_path_buf();
        let worktree_path = worktree_path.to_path_buf();
        let session_id = session_id.to_string();

        tokio::task::spawn_blocking(move || {
            git::remove_worktree(&repo_path, &worktree_path)?;
            log::info!("Remove {session_id}: Removed worktree");
            Ok::<(), anyhow::Error>(())
        })
        .await
        .map_err(|e| anyhow!("Task join error: {e}"))?
    }

    async fn delete_branch_async(repo_path: &Path, branch: &str, session_id: &str) -> Result<()> {
        let repo_path = repo_path.to_path_buf();
        let branch = branch.to_string();
        let session_id = session_id.to_string();

        tokio::task::spawn_blocking(move || {
            if !git::delete_branch_if_exists(&repo_path, &branch)? {
                log::info!("Remove {session_id}: Branch doesn't exist, skipping deletion");
            }
            Ok::<(), anyhow::Error>(())
        })
        .await
        .map_err(|e| anyhow!("Task join error: {e}"))?
    }

    async fn prune_worktrees_async(repo_path: &Path) -> Result<()> {
        let repo_path: PathBuf = repo_path.to_path_buf();
        tokio::task::spawn_blocking(move || git::prune_worktrees(&repo_path))
            .await
            .map_err(|e| anyhow!("Task join error: {e}"))?
    }
}
