//! Binary entry point for the signaling relay

use clap::Parser;
use signaling_relay::{Args, ServerConfig, ServerState, run_with_shutdown};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config: ServerConfig = Args::parse().into();
    config.validate()?;

    let listener = TcpListener::bind(config.listen).await?;
    info!(
        ready_threshold = config.ready_threshold,
        leave_on_close = config.leave_on_close,
        "starting signaling relay"
    );
    let state = ServerState::new(config);

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let server = tokio::spawn(run_with_shutdown(listener, state, shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("received shutdown signal");
    let _ = shutdown_tx.send(());

    if let Err(e) = server.await? {
        error!("server error: {}", e);
    }
    Ok(())
}
