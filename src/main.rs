use anyhow::{Context, Result};
use clap::Parser;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use werft::cli::Cli;
use werft::config::{WerftConfig, default_config_path};
use werft::gateway::AppState;
use werft::gateway::http::handle_request;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = WerftConfig::load(&config_path)?;
    cli.apply_to(&mut config);

    std::fs::create_dir_all(&config.store_root).with_context(|| {
        format!(
            "Failed to create store root {}",
            config.store_root.display()
        )
    })?;

    let state = AppState::from_config(&config)?;

    let listener = TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    log::info!(
        "werft listening on {} (store root: {})",
        config.bind_address,
        config.store_root.display()
    );

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                log::warn!("Failed to accept connection: {e}");
                continue;
            }
        };
        log::debug!("Accepted connection from {peer}");

        let state = state.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| handle_request(req, state.clone()));
            // `with_upgrades` keeps terminal WebSocket connections alive
            // past the HTTP exchange.
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service)
                .with_upgrades()
                .await
            {
                log::debug!("Connection from {peer} ended: {e}");
            }
        });
    }
}
