use crate::domains::git::service as git;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const WORKTREE_IDENTITY_NAME: &str = "Werft Session";
const WORKTREE_IDENTITY_EMAIL: &str = "session@werft.local";

pub struct BootstrapConfig<'a> {
    pub session_id: &'a str,
    pub branch_name: &'a str,
    pub worktree_path: &'a Path,
    pub base_branch: &'a str,
}

#[derive(Debug)]
pub struct BootstrapResult {
    pub branch: String,
    pub base_branch: String,
    pub base_commit: String,
    pub worktree_path: PathBuf,
}

/// Creates the isolation branch + worktree pair for a session and seeds the
/// local commit identity. Any failure rolls the partial worktree back so the
/// registry never points at a half-created directory.
pub struct WorktreeBootstrapper<'a> {
    repo_path: &'a Path,
}

impl<'a> WorktreeBootstrapper<'a> {
    pub fn new(repo_path: &'a Path) -> Self {
        Self { repo_path }
    }

    pub fn bootstrap_worktree(&self, config: BootstrapConfig<'_>) -> Result<BootstrapResult> {
        log::info!(
            "Bootstrapping worktree for session '{}' at {}",
            config.session_id,
            config.worktree_path.display()
        );

        let base_commit = git::create_worktree_from_base(
            self.repo_path,
            config.branch_name,
            config.worktree_path,
            config.base_branch,
        )
        .with_context(|| {
            format!(
                "Failed to create worktree for session '{}'",
                config.session_id
            )
        })?;

        if let Err(e) = git::configure_worktree_identity(
            config.worktree_path,
            WORKTREE_IDENTITY_NAME,
            WORKTREE_IDENTITY_EMAIL,
        ) {
            // Identity seeding failure poisons every future commit; undo
            self.rollback(config.branch_name, config.worktree_path);
            return Err(e).with_context(|| {
                format!(
                    "Failed to seed git identity for session '{}'",
                    config.session_id
                )
            });
        }

        Ok(BootstrapResult {
            branch: config.branch_name.to_string(),
            base_branch: config.base_branch.to_string(),
            base_commit,
            worktree_path: config.worktree_path.to_path_buf(),
        })
    }

    /// Undo a partial bootstrap. Called when a later creation step fails.
    pub fn rollback(&self, branch_name: &str, worktree_path: &Path) {
        if let Err(e) = git::remove_worktree(self.repo_path, worktree_path) {
            log::warn!(
                "Rollback: failed to remove worktree {}: {e}",
                worktree_path.display()
            );
        }
        if let Err(e) = git::delete_branch_if_exists(self.repo_path, branch_name) {
            log::warn!("Rollback: failed to delete branch '{branch_name}': {e}");
        }
    }
}
