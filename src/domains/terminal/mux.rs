use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Driver for the tmux server that hosts every persistent terminal
/// container. A mux session outlives any number of attached clients, which
/// is what makes reconnection resume exactly where the terminal left off.
#[derive(Clone, Debug)]
pub struct TmuxControl {
    tmux_bin: PathBuf,
}

impl TmuxControl {
    pub fn new(tmux_bin: Option<PathBuf>) -> Result<Self> {
        let tmux_bin = match tmux_bin {
            Some(path) => path,
            None => which::which("tmux").context("tmux binary not found on PATH")?,
        };
        Ok(Self { tmux_bin })
    }

    pub fn binary(&self) -> &Path {
        &self.tmux_bin
    }

    async fn run(&self, args: &[&str]) -> Result<std::process::Output> {
        Command::new(&self.tmux_bin)
            .args(args)
            .output()
            .await
            .with_context(|| format!("Failed to run tmux {args:?}"))
    }

    pub async fn has_session(&self, name: &str) -> Result<bool> {
        // `=` forces an exact match instead of tmux's prefix matching
        let target = format!("={name}");
        let output = self.run(&["has-session", "-t", &target]).await?;
        Ok(output.status.success())
    }

    pub async fn create_detached(&self, name: &str, cwd: &Path) -> Result<()> {
        let cwd_str = cwd.to_string_lossy();
        let output = self
            .run(&["new-session", "-d", "-s", name, "-c", &cwd_str])
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("tmux new-session failed for '{name}': {stderr}"));
        }

        // Generous scrollback so reconnecting clients see recent history
        let _ = self
            .run(&["set-option", "-t", name, "history-limit", "10000"])
            .await;

        log::info!("Created detached tmux session '{name}' in {cwd_str}");
        Ok(())
    }

    /// Kill the mux session. Missing sessions are tolerated; teardown must
    /// converge even when a session was killed out-of-band.
    pub async fn kill_session(&self, name: &str) -> Result<()> {
        let target = format!("={name}");
        let output = self.run(&["kill-session", "-t", &target]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("can't find session") || stderr.contains("no server running") {
                log::info!("tmux session '{name}' already gone");
                return Ok(());
            }
            return Err(anyhow!("tmux kill-session failed for '{name}': {stderr}"));
        }
        log::info!("Killed tmux session '{name}'");
        Ok(())
    }

    /// Type a command line into the session and press enter.
    pub async fn send_command(&self, name: &str, command: &str) -> Result<()> {
        let target = format!("={name}");
        let output = self
            .run(&["send-keys", "-t", &target, command, "Enter"])
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("tmux send-keys failed for '{name}': {stderr}"));
        }
        Ok(())
    }

    /// Interrupt whatever runs in the foreground (C-c), without killing the
    /// session itself.
    pub async fn send_interrupt(&self, name: &str) -> Result<()> {
        let target = format!("={name}");
        let output = self.run(&["send-keys", "-t", &target, "C-c"]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("tmux interrupt failed for '{name}': {stderr}"));
        }
        Ok(())
    }

    pub async fn resize_window(&self, name: &str, cols: u16, rows: u16) -> Result<()> {
        let target = format!("={name}");
        let cols = cols.to_string();
        let rows = rows.to_string();
        let _ = self
            .run(&["resize-window", "-t", &target, "-x", &cols, "-y", &rows])
            .await;
        Ok(())
    }

    /// Command line for an interactive process that attaches to the mux
    /// session; killing that process detaches without touching the session.
    pub fn attach_args(&self, name: &str) -> Vec<String> {
        vec![
            "attach-session".to_string(),
            "-t".to_string(),
            format!("={name}"),
        ]
    }
}
