use anyhow::{Result, anyhow};
use std::path::PathBuf;

use crate::domains::git::service as git;

/// On-disk layout of the repository store:
///
/// ```text
/// <root>/<repository_id>/source                canonical clone (never mutated)
/// <root>/<repository_id>/worktrees/<session>   per-session working copies
/// ```
///
/// The canonical clone is provisioned out-of-band; session machinery only
/// reads it to resolve base revisions and to register worktrees.
#[derive(Clone, Debug)]
pub struct RepoStore {
    root: PathBuf,
}

impl RepoStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Repository ids become path components; reject anything that could
    /// escape the store root.
    pub fn validate_repo_id(repo_id: &str) -> Result<()> {
        if repo_id.is_empty() || repo_id.len() > 100 {
            return Err(anyhow!("Invalid repository id"));
        }
        let allowed =
            |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.');
        if !repo_id.chars().all(allowed) || repo_id.starts_with('.') {
            return Err(anyhow!("Repository id contains invalid characters"));
        }
        Ok(())
    }

    pub fn canonical_path(&self, repo_id: &str) -> Result<PathBuf> {
        Self::validate_repo_id(repo_id)?;
        Ok(self.root.join(repo_id).join("source"))
    }

    pub fn worktrees_dir(&self, repo_id: &str) -> Result<PathBuf> {
        Self::validate_repo_id(repo_id)?;
        Ok(self.root.join(repo_id).join("worktrees"))
    }

    pub fn worktree_path(&self, repo_id: &str, name: &str) -> Result<PathBuf> {
        Ok(self.worktrees_dir(repo_id)?.join(name))
    }

    /// Tab worktrees live in a sibling tree so they can never collide with a
    /// session whose id happens to contain a separator.
    pub fn tab_worktree_path(
        &self,
        repo_id: &str,
        session_id: &str,
        tab_id: &str,
    ) -> Result<PathBuf> {
        Self::validate_repo_id(repo_id)?;
        Ok(self
            .root
            .join(repo_id)
            .join("tab-worktrees")
            .join(session_id)
            .join(tab_id))
    }

    /// Precondition check for session creation: the canonical clone must
    /// already exist locally. Missing clones are a caller problem, never
    /// auto-cloned here.
    pub fn require_canonical(&self, repo_id: &str) -> Result<PathBuf> {
        let path = self.canonical_path(repo_id)?;
        if !git::repository_exists(&path) {
            return Err(anyhow!(
                "Repository '{repo_id}' has no canonical clone at {}",
                path.display()
            ));
        }
        Ok(path)
    }
}
