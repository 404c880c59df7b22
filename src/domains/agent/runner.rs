use crate::domains::agent::events::{AgentEvent, ChatMessage, ChatRole};
use crate::domains::agent::transcoder::StreamTranscoder;
use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Spawns the external agent process for one turn and streams transcoded
/// events. The process is scoped to the session's working copy; its stdout
/// is the line-delimited JSON stream the transcoder consumes.
#[derive(Clone)]
pub struct AgentRunner {
    command: String,
}

impl AgentRunner {
    pub fn new(command: String) -> Self {
        Self { command }
    }

    fn build_command(&self, worktree_path: &Path, prompt: &str) -> Result<Command> {
        let mut parts = shell_words::split(&self.command)
            .map_err(|e| anyhow!("Invalid agent command '{}': {e}", self.command))?;
        if parts.is_empty() {
            return Err(anyhow!("Agent command is empty"));
        }

        let program = parts.remove(0);
        let mut cmd = Command::new(program);
        cmd.args(parts);
        cmd.arg("-p").arg(prompt);
        cmd.arg("--output-format").arg("stream-json");
        cmd.arg("--verbose");
        cmd.current_dir(worktree_path);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        Ok(cmd)
    }

    /// Run one turn. Events are pushed to `events_tx` in stream order; the
    /// channel always ends with exactly one `Done` or `Error` terminal event.
    pub async fn run_turn(
        &self,
        worktree_path: &Path,
        message: &str,
        history: &[ChatMessage],
        events_tx: mpsc::Sender<AgentEvent>,
    ) -> Result<()> {
        let prompt = render_prompt(message, history);
        let mut cmd = self.build_command(worktree_path, &prompt)?;

        log::info!(
            "Starting agent turn in {} ({} history entries)",
            worktree_path.display(),
            history.len()
        );

        let mut child = cmd.spawn().context("Failed to spawn agent process")?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("Agent process has no stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("Agent process has no stderr"))?;

        // Drain stderr concurrently so the agent can't block on a full pipe
        let stderr_task = tokio::spawn(async move {
            let mut collected = String::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                log::debug!("agent stderr: {line}");
                collected.push_str(&line);
                collected.push('\n');
            }
            collected
        });

        let mut transcoder = StreamTranscoder::new();
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            for event in transcoder.transcode_line(&line) {
                if events_tx.send(event).await.is_err() {
                    // Client went away; stop the agent rather than run headless
                    log::info!("Agent event receiver dropped, killing agent process");
                    let _ = child.kill().await;
                    return Ok(());
                }
            }
        }

        let status = child.wait().await.context("Failed to await agent process")?;
        let exit_code = status.code();
        if !status.success() {
            let stderr_text = stderr_task.await.unwrap_or_default();
            if !stderr_text.trim().is_empty() {
                log::warn!("Agent process stderr: {}", stderr_text.trim());
            }
        }

        let terminal_event = transcoder.finish(exit_code);
        let _ = events_tx.send(terminal_event).await;
        Ok(())
    }
}

/// The agent CLI takes a single prompt string; prior turns are rendered as
/// role-labelled context above the new message.
fn render_prompt(message: &str, history: &[ChatMessage]) -> String {
    if history.is_empty() {
        return message.to_string();
    }

    let mut prompt = String::from("Conversation so far:\n\n");
    for entry in history {
        let role = match entry.role {
            ChatRole::User => "User",
            ChatRole::Assistant => "Assistant",
        };
        prompt.push_str(&format!("{role}: {}\n\n", entry.content));
    }
    prompt.push_str(&format!("User: {message}"));
    prompt
}
