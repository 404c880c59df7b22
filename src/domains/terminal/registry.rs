use crate::domains::terminal::id::TerminalKey;
use crate::domains::terminal::mux::TmuxControl;
use crate::domains::terminal::pty::{PtyProcess, spawn_pty_process};
use anyhow::Result;
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::pty::PtyController;

/// What an attach produced: the live process plus how the backing mux
/// session was obtained.
pub struct AttachOutcome {
    pub process: PtyProcess,
    /// The mux session was created by this attach (terminal is brand new).
    pub is_new_session: bool,
    /// The mux session already existed; the terminal resumed its state.
    pub reconnected: bool,
}

struct Slot {
    controller: Option<PtyController>,
}

/// In-memory table of live process handles keyed by terminal. Guarded per
/// key, never globally, so attaches on different sessions proceed in
/// parallel. Handles are not durable: a server restart loses them while the
/// tmux sessions keep running and are re-attached on the next connection.
pub struct TerminalRegistry {
    mux: TmuxControl,
    agent_command: String,
    slots: DashMap<String, Arc<Mutex<Slot>>>,
}

impl TerminalRegistry {
    pub fn new(mux: TmuxControl, agent_command: String) -> Self {
        Self {
            mux,
            agent_command,
            slots: DashMap::new(),
        }
    }

    pub fn mux(&self) -> &TmuxControl {
        &self.mux
    }

    fn slot(&self, name: &str) -> Arc<Mutex<Slot>> {
        self.slots
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Slot { controller: None })))
            .clone()
    }

    /// Attach a fresh interactive process to the terminal's mux session,
    /// creating the session (and auto-launching the default foreground
    /// program) on first use. Any lingering handle for the same key is
    /// replaced, never duplicated.
    pub async fn attach(
        &self,
        key: &TerminalKey,
        cwd: &Path,
        cols: u16,
        rows: u16,
    ) -> Result<AttachOutcome> {
        let name = key.mux_session_name();
        let slot = self.slot(&name);
        let mut slot = slot.lock().await;

        if let Some(old) = slot.controller.take() {
            log::info!("Replacing lingering terminal handle for {key}");
            old.kill();
        }

        let existed = self.mux.has_session(&name).await?;
        if !existed {
            self.mux.create_detached(&name, cwd).await?;
            // A brand-new terminal boots straight into the agent program;
            // reattaches must not relaunch it.
            if !self.agent_command.is_empty()
                && let Err(e) = self.mux.send_command(&name, &self.agent_command).await
            {
                log::warn!("Failed to launch agent program in '{name}': {e}");
            }
        }

        self.mux.resize_window(&name, cols, rows).await?;

        let process =
            spawn_pty_process(self.mux.binary(), &self.mux.attach_args(&name), cwd, cols, rows)?;
        slot.controller = Some(process.controller.clone());

        log::info!(
            "Attached terminal {key} (new_session={}, reconnected={existed})",
            !existed
        );
        Ok(AttachOutcome {
            process,
            is_new_session: !existed,
            reconnected: existed,
        })
    }

    /// Sever the attachment only. The mux session stays alive, which is what
    /// makes a later reconnect resume the terminal's state.
    pub async fn detach(&self, key: &TerminalKey) {
        let name = key.mux_session_name();
        // Clone the slot handle out before awaiting; holding the map guard
        // across an await would block other keys on the same shard.
        let Some(slot) = self.slots.get(&name).map(|entry| entry.clone()) else {
            return;
        };
        let mut slot = slot.lock().await;
        if let Some(controller) = slot.controller.take() {
            controller.kill();
            log::info!("Detached terminal {key}");
        }
    }

    /// Interrupt the foreground program and relaunch the default agent
    /// command inside the existing mux session.
    pub async fn restart(&self, key: &TerminalKey) -> Result<()> {
        let name = key.mux_session_name();
        self.mux.send_interrupt(&name).await?;
        // Give the foreground program a moment to die before retyping
        tokio::time::sleep(Duration::from_millis(200)).await;
        if !self.agent_command.is_empty() {
            self.mux.send_command(&name, &self.agent_command).await?;
        }
        log::info!("Restarted foreground program for {key}");
        Ok(())
    }

    /// Full teardown for one terminal: handle and mux session both die.
    /// Only session/tab deletion takes this path.
    pub async fn kill_terminal(&self, key: &TerminalKey) -> Result<()> {
        let name = key.mux_session_name();
        self.detach(key).await;
        self.mux.kill_session(&name).await?;
        self.slots.remove(&name);
        Ok(())
    }

    /// Teardown for a whole session: its own terminal plus every tab
    /// terminal. Errors are logged; deletion must keep converging.
    pub async fn kill_session_terminals(&self, session_id: &str, tab_ids: &[String]) {
        let mut keys = vec![TerminalKey::session(session_id)];
        keys.extend(
            tab_ids
                .iter()
                .map(|tab| TerminalKey::tab(session_id, tab)),
        );

        for key in keys {
            if let Err(e) = self.kill_terminal(&key).await {
                log::warn!("Failed to kill terminal {key}: {e}");
            }
        }
    }
}
