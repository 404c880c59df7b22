use crate::config::WerftConfig;
use crate::domains::agent::AgentRunner;
use crate::domains::repos::RepoStore;
use crate::domains::sessions::lifecycle::hooks::{SessionHook, SetupCommandHook};
use crate::domains::sessions::repository::SessionDbManager;
use crate::domains::sessions::service::SessionManager;
use crate::domains::terminal::mux::TmuxControl;
use crate::domains::terminal::registry::TerminalRegistry;
use crate::infrastructure::database::Database;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

/// Everything a connection handler needs, shared across all connections.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub terminals: Arc<TerminalRegistry>,
    pub agent: AgentRunner,
    pub ping_interval: Duration,
}

impl AppState {
    pub fn from_config(config: &WerftConfig) -> Result<Self> {
        let db = Database::new(Some(config.database_path()))?;
        let store = RepoStore::new(config.store_root.clone());

        let mut hooks: Vec<Arc<dyn SessionHook>> = Vec::new();
        if let Some(setup) = &config.setup_command {
            hooks.push(Arc::new(SetupCommandHook::new(setup.clone())));
        }

        let sessions = Arc::new(
            SessionManager::new(SessionDbManager::new(db), store).with_hooks(hooks),
        );

        let mux = TmuxControl::new(config.tmux_binary.clone())?;
        let terminals = Arc::new(TerminalRegistry::new(
            mux,
            config.terminal_command.clone(),
        ));

        Ok(Self {
            sessions,
            terminals,
            agent: AgentRunner::new(config.agent_command.clone()),
            ping_interval: Duration::from_secs(config.ping_interval_secs.max(1)),
        })
    }
}
