use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Post-creation side operation (dependency install, editor config seeding).
/// Hooks run after the working copy exists and before the session is handed
/// to the caller; a failing hook is logged and never fails creation.
#[async_trait]
pub trait SessionHook: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, session_id: &str, branch: &str, worktree_path: &Path) -> Result<()>;
}

/// Runs all hooks in order, best-effort.
pub async fn run_hooks(
    hooks: &[std::sync::Arc<dyn SessionHook>],
    session_id: &str,
    branch: &str,
    worktree_path: &Path,
) {
    for hook in hooks {
        if let Err(e) = hook.run(session_id, branch, worktree_path).await {
            log::warn!(
                "Post-creation hook '{}' failed for session '{session_id}': {e}",
                hook.name()
            );
        } else {
            log::debug!(
                "Post-creation hook '{}' completed for session '{session_id}'",
                hook.name()
            );
        }
    }
}

/// Shell-command hook configured by the operator (e.g. `npm install`).
/// Session metadata is exposed through the environment the way setup scripts
/// expect it.
pub struct SetupCommandHook {
    command: String,
}

impl SetupCommandHook {
    pub fn new(command: String) -> Self {
        Self { command }
    }
}

#[async_trait]
impl SessionHook for SetupCommandHook {
    fn name(&self) -> &str {
        "setup-command"
    }

    async fn run(&self, session_id: &str, branch: &str, worktree_path: &Path) -> Result<()> {
        log::info!("Executing setup command for session {session_id}");

        let output = Command::new("sh")
            .args(["-c", &self.command])
            .current_dir(worktree_path)
            .env("WORKTREE_PATH", worktree_path)
            .env("SESSION_ID", session_id)
            .env("BRANCH_NAME", branch)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Setup command failed: {stderr}"));
        }

        Ok(())
    }
}
