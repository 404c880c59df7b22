use super::branches::validate_branch_name;
use super::repository::get_commit_hash;
use anyhow::{Result, anyhow};
use git2::{BranchType, Repository, WorktreeAddOptions, WorktreePruneOptions};
use std::path::{Path, PathBuf};

/// Create a session worktree forked from `base_branch`. The isolation branch
/// is (re)pointed at the base commit; a leftover branch from a reconciled
/// session is replaced rather than reused.
pub fn create_worktree_from_base(
    repo_path: &Path,
    branch_name: &str,
    worktree_path: &Path,
    base_branch: &str,
) -> Result<String> {
    validate_branch_name(branch_name)?;

    let base_commit_hash = get_commit_hash(repo_path, base_branch).map_err(|e| {
        anyhow!("Base branch '{base_branch}' does not exist in the repository: {e}")
    })?;

    log::info!("Creating worktree from commit {base_commit_hash} ({base_branch})");

    if let Some(parent) = worktree_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let repo = Repository::open(repo_path)?;

    // A stale branch from a previous life of this session id gets replaced
    if let Ok(mut branch) = repo.find_branch(branch_name, BranchType::Local) {
        log::info!("Deleting existing branch: {branch_name}");
        branch.delete()?;
    }

    let base_oid = git2::Oid::from_str(&base_commit_hash)?;
    let base_commit = repo.find_commit(base_oid)?;

    let new_branch = repo.branch(branch_name, &base_commit, false)?;
    let branch_ref = new_branch.into_reference();

    let mut opts = WorktreeAddOptions::new();
    opts.reference(Some(&branch_ref));

    repo.worktree(
        worktree_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(branch_name),
        worktree_path,
        Some(&opts),
    )?;

    log::info!(
        "Successfully created worktree at: {}",
        worktree_path.display()
    );
    Ok(base_commit_hash)
}

/// Remove a worktree directory and its git bookkeeping. Tolerates a worktree
/// that was already partially removed out-of-band.
pub fn remove_worktree(repo_path: &Path, worktree_path: &Path) -> Result<()> {
    let repo = Repository::open(repo_path)?;

    // Find the worktree by path (handle path canonicalization for macOS)
    let canonical_target_path = worktree_path
        .canonicalize()
        .unwrap_or_else(|_| worktree_path.to_path_buf());

    let worktrees = repo.worktrees()?;
    for wt_name in worktrees.iter().flatten() {
        if let Ok(wt) = repo.find_worktree(wt_name) {
            let wt_path = wt.path();
            let canonical_wt_path = wt_path
                .canonicalize()
                .unwrap_or_else(|_| wt_path.to_path_buf());
            if canonical_wt_path == canonical_target_path || wt_path == worktree_path {
                // Remove the directory first; pruning requires it gone
                if worktree_path.exists()
                    && let Err(e) = std::fs::remove_dir_all(worktree_path)
                {
                    return Err(anyhow!("Failed to remove worktree directory: {e}"));
                }

                if let Err(e) = wt.prune(Some(&mut WorktreePruneOptions::new())) {
                    log::warn!("Failed to prune worktree from git registry: {e}");
                }
                return Ok(());
            }
        }
    }

    // Not registered as a worktree; remove the directory if it lingers
    if worktree_path.exists() {
        std::fs::remove_dir_all(worktree_path)?;
        Ok(())
    } else {
        Err(anyhow!("Worktree not found: {worktree_path:?}"))
    }
}

pub fn list_worktrees(repo_path: &Path) -> Result<Vec<PathBuf>> {
    let repo = Repository::open(repo_path)?;
    let mut worktree_paths = Vec::new();

    if let Some(workdir) = repo.workdir() {
        worktree_paths.push(workdir.to_path_buf());
    }

    let worktrees = repo.worktrees()?;
    for wt_name in worktrees.iter().flatten() {
        if let Ok(wt) = repo.find_worktree(wt_name) {
            worktree_paths.push(wt.path().to_path_buf());
        }
    }

    Ok(worktree_paths)
}

/// Drop bookkeeping for worktrees whose directories no longer exist.
pub fn prune_worktrees(repo_path: &Path) -> Result<()> {
    let repo = Repository::open(repo_path)?;
    let worktrees = repo.worktrees()?;

    for wt_name in worktrees.iter().flatten() {
        if let Ok(wt) = repo.find_worktree(wt_name)
            && wt.validate().is_err()
        {
            wt.prune(Some(&mut WorktreePruneOptions::new()))?;
        }
    }

    Ok(())
}

#[cfg(test)]
pub fn is_worktree_registered(repo_path: &Path, worktree_path: &Path) -> Result<bool> {
    let repo = Repository::open(repo_path)?;
    let worktrees = repo.worktrees()?;

    let canonical_worktree_path = worktree_path
        .canonicalize()
        .unwrap_or_else(|_| worktree_path.to_path_buf());

    for wt_name in worktrees.iter().flatten() {
        if let Ok(wt) = repo.find_worktree(wt_name) {
            let wt_path = wt.path();
            let canonical_wt_path = wt_path
                .canonicalize()
                .unwrap_or_else(|_| wt_path.to_path_buf());

            if canonical_wt_path == canonical_worktree_path {
                return Ok(true);
            }
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    fn setup_test_repo() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let repo_path = temp_dir.path().to_path_buf();

        Command::new("git")
            .args(["init", "--initial-branch=main"])
            .current_dir(&repo_path)
            .output()
            .unwrap();
        Command::new("git")
            .args(["config", "user.email", "test@example.com"])
            .current_dir(&repo_path)
            .output()
            .unwrap();
        Command::new("git")
            .args(["config", "user.name", "Test User"])
            .current_dir(&repo_path)
            .output()
            .unwrap();

        std::fs::write(repo_path.join("README.md"), "Initial").unwrap();
        Command::new("git")
            .args(["add", "."])
            .current_dir(&repo_path)
            .output()
            .unwrap();
        Command::new("git")
            .args(["commit", "-m", "init"])
            .current_dir(&repo_path)
            .output()
            .unwrap();

        (temp_dir, repo_path)
    }

    #[test]
    fn create_and_remove_worktree_round_trip() {
        let (_tmp, repo_path) = setup_test_repo();
        let wt_path = repo_path.join("worktrees/alpha");

        let base = create_worktree_from_base(&repo_path, "werft/alpha", &wt_path, "main").unwrap();
        assert_eq!(base.len(), 40);
        assert!(wt_path.join("README.md").exists());
        assert!(is_worktree_registered(&repo_path, &wt_path).unwrap());

        remove_worktree(&repo_path, &wt_path).unwrap();
        assert!(!wt_path.exists());
        assert!(!is_worktree_registered(&repo_path, &wt_path).unwrap());
    }

    #[test]
    fn create_replaces_stale_branch() {
        let (_tmp, repo_path) = setup_test_repo();

        Command::new("git")
            .args(["branch", "werft/beta"])
            .current_dir(&repo_path)
            .output()
            .unwrap();

        let wt_path = repo_path.join("worktrees/beta");
        create_worktree_from_base(&repo_path, "werft/beta", &wt_path, "main").unwrap();
        assert!(wt_path.exists());
    }

    #[test]
    fn worktrees_from_same_base_diverge_independently() {
        let (_tmp, repo_path) = setup_test_repo();
        let wt_a = repo_path.join("worktrees/a");
        let wt_b = repo_path.join("worktrees/b");

        create_worktree_from_base(&repo_path, "werft/a", &wt_a, "main").unwrap();
        create_worktree_from_base(&repo_path, "werft/b", &wt_b, "main").unwrap();

        std::fs::write(wt_a.join("only-in-a.txt"), "a").unwrap();
        assert!(!wt_b.join("only-in-a.txt").exists());
        assert!(wt_b.join("README.md").exists());
    }

    #[test]
    fn remove_tolerates_directory_deleted_out_of_band() {
        let (_tmp, repo_path) = setup_test_repo();
        let wt_path = repo_path.join("worktrees/gone");

        create_worktree_from_base(&repo_path, "werft/gone", &wt_path, "main").unwrap();
        std::fs::remove_dir_all(&wt_path).unwrap();

        // Registered but directory missing: removal should still succeed
        remove_worktree(&repo_path, &wt_path).unwrap();
        assert!(!is_worktree_registered(&repo_path, &wt_path).unwrap());
    }

    #[test]
    fn prune_drops_invalid_bookkeeping() {
        let (_tmp, repo_path) = setup_test_repo();
        let wt_path = repo_path.join("worktrees/pruned");

        create_worktree_from_base(&repo_path, "werft/pruned", &wt_path, "main").unwrap();
        std::fs::remove_dir_all(&wt_path).unwrap();

        prune_worktrees(&repo_path).unwrap();
        assert!(!is_worktree_registered(&repo_path, &wt_path).unwrap());
    }
}
