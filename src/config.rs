use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_bind_address() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_agent_command() -> String {
    "claude".to_string()
}

fn default_terminal_command() -> String {
    "claude".to_string()
}

fn default_ping_interval_secs() -> u64 {
    30
}

/// Server configuration, loaded from TOML and overridable per-field from
/// the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WerftConfig {
    /// Address the gateway listens on.
    pub bind_address: String,
    /// Root of the repository store (`<root>/<repo>/source`, worktrees
    /// beneath it).
    pub store_root: PathBuf,
    /// Registry database location. Defaults to `<store_root>/werft.db`.
    pub database_path: Option<PathBuf>,
    /// Command line of the external agent process for chat turns.
    pub agent_command: String,
    /// Foreground program auto-launched in a brand-new terminal.
    pub terminal_command: String,
    /// Explicit tmux binary; resolved from PATH when unset.
    pub tmux_binary: Option<PathBuf>,
    /// Optional setup command run after worktree creation (best-effort).
    pub setup_command: Option<String>,
    /// WebSocket keep-alive ping period in seconds.
    pub ping_interval_secs: u64,
}

impl Default for WerftConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            store_root: default_store_root(),
            database_path: None,
            agent_command: default_agent_command(),
            terminal_command: default_terminal_command(),
            tmux_binary: None,
            setup_command: None,
            ping_interval_secs: default_ping_interval_secs(),
        }
    }
}

fn default_store_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("werft")
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("werft")
        .join("config.toml")
}

impl WerftConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!(
                "No config file at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.store_root.join("werft.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = WerftConfig::load(Path::new("/nonexistent/werft.toml")).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:8787");
        assert_eq!(config.agent_command, "claude");
        assert_eq!(config.ping_interval_secs, 30);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "bind_address = \"0.0.0.0:9000\"\nstore_root = \"/srv/werft\"\n",
        )
        .unwrap();

        let config = WerftConfig::load(&path).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:9000");
        assert_eq!(config.store_root, PathBuf::from("/srv/werft"));
        assert_eq!(config.terminal_command, "claude");
        assert_eq!(config.database_path(), PathBuf::from("/srv/werft/werft.db"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "bind_address = [not toml").unwrap();
        assert!(WerftConfig::load(&path).is_err());
    }
}
