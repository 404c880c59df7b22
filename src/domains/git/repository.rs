use anyhow::{Result, anyhow};
use git2::{Repository, StatusOptions};
use std::path::Path;

/// Open the canonical repository and confirm it is usable as a base for
/// session worktrees. Bare clones are accepted.
pub fn open_repository(repo_path: &Path) -> Result<Repository> {
    Repository::open(repo_path)
        .map_err(|e| anyhow!("Failed to open repository at {}: {e}", repo_path.display()))
}

pub fn repository_exists(repo_path: &Path) -> bool {
    Repository::open(repo_path).is_ok()
}

/// Cheap validity probe for a working copy: the path must exist and be
/// recognizable to git. No network, no status walk.
pub fn is_git_workdir(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    match Repository::open(path) {
        Ok(repo) => repo.workdir().is_some(),
        Err(_) => false,
    }
}

pub fn get_commit_hash(repo_path: &Path, reference: &str) -> Result<String> {
    let repo = open_repository(repo_path)?;

    // Prefer a local branch, fall back to origin/<ref>, then a raw revspec.
    let candidates = [
        format!("refs/heads/{reference}"),
        format!("refs/remotes/origin/{reference}"),
    ];
    for name in &candidates {
        if let Ok(git_ref) = repo.find_reference(name)
            && let Ok(commit) = git_ref.peel_to_commit()
        {
            return Ok(commit.id().to_string());
        }
    }

    let obj = repo
        .revparse_single(reference)
        .map_err(|e| anyhow!("Cannot resolve '{reference}' in {}: {e}", repo_path.display()))?;
    let commit = obj
        .peel_to_commit()
        .map_err(|e| anyhow!("'{reference}' does not point to a commit: {e}"))?;
    Ok(commit.id().to_string())
}

pub fn get_default_branch(repo_path: &Path) -> Result<String> {
    let repo = open_repository(repo_path)?;

    if let Ok(head) = repo.head()
        && head.is_branch()
        && let Some(name) = head.shorthand()
    {
        return Ok(name.to_string());
    }

    // Unborn HEAD still names its target branch.
    if let Ok(reference) = repo.find_reference("HEAD")
        && let Some(target) = reference.symbolic_target()
        && let Some(name) = target.strip_prefix("refs/heads/")
    {
        return Ok(name.to_string());
    }

    Err(anyhow!(
        "Cannot determine default branch for {}",
        repo_path.display()
    ))
}

/// Seed the local identity a worktree needs for future commits. Session
/// worktrees are created on machines where no global git identity may exist.
pub fn configure_worktree_identity(worktree_path: &Path, name: &str, email: &str) -> Result<()> {
    let repo = Repository::open(worktree_path)
        .map_err(|e| anyhow!("Failed to open worktree {}: {e}", worktree_path.display()))?;
    let mut config = repo
        .config()
        .map_err(|e| anyhow!("Failed to open worktree config: {e}"))?;

    if config.get_string("user.name").is_err() {
        config.set_str("user.name", name)?;
    }
    if config.get_string("user.email").is_err() {
        config.set_str("user.email", email)?;
    }
    Ok(())
}

pub fn has_uncommitted_changes(workdir: &Path) -> Result<bool> {
    let repo = Repository::open(workdir)?;
    let mut opts = StatusOptions::new();
    opts.include_untracked(true);
    let statuses = repo.statuses(Some(&mut opts))?;
    Ok(!statuses.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    fn init_repo(path: &Path) {
        Command::new("git")
            .args(["init", "--initial-branch=main"])
            .current_dir(path)
            .output()
            .unwrap();
        Command::new("git")
            .args(["config", "user.email", "test@example.com"])
            .current_dir(path)
            .output()
            .unwrap();
        Command::new("git")
            .args(["config", "user.name", "Test User"])
            .current_dir(path)
            .output()
            .unwrap();
        Command::new("git")
            .args(["commit", "--allow-empty", "-m", "init"])
            .current_dir(path)
            .output()
            .unwrap();
    }

    #[test]
    fn commit_hash_resolves_local_branch() {
        let tmp = TempDir::new().unwrap();
        init_repo(tmp.path());

        let hash = get_commit_hash(tmp.path(), "main").unwrap();
        assert_eq!(hash.len(), 40);
    }

    #[test]
    fn default_branch_detected() {
        let tmp = TempDir::new().unwrap();
        init_repo(tmp.path());
        assert_eq!(get_default_branch(tmp.path()).unwrap(), "main");
    }

    #[test]
    fn workdir_probe_rejects_plain_directory() {
        let tmp = TempDir::new().unwrap();
        assert!(!is_git_workdir(tmp.path()));
        assert!(!is_git_workdir(&tmp.path().join("missing")));

        init_repo(tmp.path());
        assert!(is_git_workdir(tmp.path()));
    }

    #[test]
    fn identity_seeding_does_not_override_existing() {
        let tmp = TempDir::new().unwrap();
        init_repo(tmp.path());

        configure_worktree_identity(tmp.path(), "Werft Session", "session@werft.local").unwrap();

        let repo = Repository::open(tmp.path()).unwrap();
        let config = repo.config().unwrap();
        // init_repo already set an identity; seeding must not clobber it.
        assert_eq!(config.get_string("user.name").unwrap(), "Test User");
    }
}
