//! Accept loop

use crate::error::SignalingError;
use crate::handler::handle_connection;
use crate::state::ServerState;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Accept connections until the process exits.
///
/// # Errors
///
/// Returns an error if the listener's local address cannot be read.
pub async fn run(listener: TcpListener, state: ServerState) -> Result<(), SignalingError> {
    let (_shutdown_tx, shutdown_rx) = watch::channel(());
    run_with_shutdown(listener, state, shutdown_rx).await
}

/// Accept connections until `shutdown` fires or its sender is dropped.
///
/// Connections already accepted keep running on their own tasks.
///
/// # Errors
///
/// Returns an error if the listener's local address cannot be read.
pub async fn run_with_shutdown(
    listener: TcpListener,
    state: ServerState,
    mut shutdown: watch::Receiver<()>,
) -> Result<(), SignalingError> {
    let local_addr = listener.local_addr()?;
    info!("signaling relay listening on ws://{}{}", local_addr, state.config().path);

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        let state = state.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, addr, state).await {
                                debug!("connection from {} closed: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("failed to accept connection: {}", e);
                    }
                }
            }
            _ = shutdown.changed() => {
                info!("shutdown signal received, no longer accepting connections");
                break;
            }
        }
    }

    Ok(())
}
