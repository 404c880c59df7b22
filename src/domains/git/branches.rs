use anyhow::{Result, anyhow};
use git2::{BranchType, Repository};
use std::path::Path;

pub fn branch_exists(repo_path: &Path, branch_name: &str) -> Result<bool> {
    let repo = Repository::open(repo_path)?;

    match repo.find_branch(branch_name, BranchType::Local) {
        Ok(_) => Ok(true),
        Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(false),
        // Treat corrupted branches as non-existent
        Err(e)
            if e.code() == git2::ErrorCode::InvalidSpec
                || e.code() == git2::ErrorCode::GenericError =>
        {
            Ok(false)
        }
        Err(e) => Err(anyhow!("Error checking branch existence: {e}")),
    }
}

pub fn delete_branch(repo_path: &Path, branch_name: &str) -> Result<()> {
    let repo = Repository::open(repo_path)?;

    let mut branch = repo
        .find_branch(branch_name, BranchType::Local)
        .map_err(|e| anyhow!("Failed to delete branch {branch_name}: {e}"))?;

    branch
        .delete()
        .map_err(|e| anyhow!("Failed to delete branch {branch_name}: {e}"))?;

    Ok(())
}

/// Delete a branch if it exists; a missing branch is not an error. Used by
/// session teardown, which must converge even after partial prior cleanup.
pub fn delete_branch_if_exists(repo_path: &Path, branch_name: &str) -> Result<bool> {
    if !branch_exists(repo_path, branch_name)? {
        log::info!("Branch '{branch_name}' doesn't exist, skipping deletion");
        return Ok(false);
    }
    delete_branch(repo_path, branch_name)?;
    log::info!("Deleted branch '{branch_name}'");
    Ok(true)
}

pub fn validate_branch_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(anyhow!("Branch name cannot be empty"));
    }
    if name.contains("..") || name.contains('\0') || name.contains('\\') {
        return Err(anyhow!("Invalid branch name"));
    }
    // Basic character whitelist (matches common git rules without being overly strict)
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.');
    if !name.chars().all(allowed) {
        return Err(anyhow!("Branch name contains invalid characters"));
    }
    Ok(())
}
