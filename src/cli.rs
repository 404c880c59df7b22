use clap::Parser;
use std::path::PathBuf;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Session and terminal orchestration server for isolated coding
/// environments.
#[derive(Debug, Parser)]
#[command(name = "werft", version = VERSION, about)]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to listen on (overrides config).
    #[arg(long)]
    pub bind: Option<String>,

    /// Root of the repository store (overrides config).
    #[arg(long)]
    pub store_root: Option<PathBuf>,

    /// Agent command for chat turns (overrides config).
    #[arg(long)]
    pub agent_command: Option<String>,

    /// tmux binary to use (overrides config and PATH lookup).
    #[arg(long)]
    pub tmux_binary: Option<PathBuf>,
}

impl Cli {
    /// CLI flags override file-level configuration field by field.
    pub fn apply_to(&self, config: &mut crate::config::WerftConfig) {
        if let Some(bind) = &self.bind {
            config.bind_address = bind.clone();
        }
        if let Some(store_root) = &self.store_root {
            config.store_root = store_root.clone();
        }
        if let Some(agent_command) = &self.agent_command {
            config.agent_command = agent_command.clone();
        }
        if let Some(tmux_binary) = &self.tmux_binary {
            config.tmux_binary = Some(tmux_binary.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WerftConfig;

    #[test]
    fn flags_override_config_fields() {
        let cli = Cli::parse_from([
            "werft",
            "--bind",
            "0.0.0.0:9999",
            "--store-root",
            "/srv/store",
        ]);

        let mut config = WerftConfig::default();
        cli.apply_to(&mut config);

        assert_eq!(config.bind_address, "0.0.0.0:9999");
        assert_eq!(config.store_root, PathBuf::from("/srv/store"));
        // Untouched fields keep their defaults
        assert_eq!(config.agent_command, "claude");
    }
}
