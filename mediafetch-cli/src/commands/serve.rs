//! Serve command - run the HTTP service.

use anyhow::{Context, Result};
use clap::Args;
use mediafetch_fetch::CancellationToken;
use mediafetch_server::{AppState, shutdown_signal};
use tokio::net::TcpListener;
use tracing::info;

use super::{build_runtime, load_config};
use crate::Cli;

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Bind address (overrides config).
    #[arg(long)]
    pub host: Option<String>,

    /// Port (overrides config).
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Runs the serve command until Ctrl+C.
pub async fn run(args: &ServeArgs, cli: &Cli) -> Result<bool> {
    let mut config = load_config(cli)?;
    if let Some(host) = &args.host {
        config.server.host.clone_from(host);
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let runtime = build_runtime(&config).await?;
    let coordinator = runtime.coordinator.clone();

    let background = CancellationToken::new();
    let janitor = coordinator.spawn_janitor(config.janitor_interval());
    let sweeper = coordinator
        .artifacts()
        .spawn_sweeper(config.sweep_interval(), background.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;

    let state = AppState::new(runtime.coordinator, runtime.proxies);
    let served = mediafetch_server::serve(listener, state, shutdown_signal()).await;

    info!("Stopping jobs");
    coordinator.shutdown();
    background.cancel();
    let _ = tokio::join!(janitor, sweeper);

    served.context("HTTP server failed")?;
    Ok(true)
}
