// Re-export the git domain surface used by session machinery
pub use super::branches::{
    branch_exists, delete_branch, delete_branch_if_exists, validate_branch_name,
};
pub use super::repository::{
    configure_worktree_identity, get_commit_hash, get_default_branch, has_uncommitted_changes,
    is_git_workdir, open_repository, repository_exists,
};
pub use super::worktrees::{
    create_worktree_from_base, list_worktrees, prune_worktrees, remove_worktree,
};
