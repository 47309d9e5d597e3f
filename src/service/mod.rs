//! Composition root
//!
//! Builds the one Connection/Router pair a process uses. The long-running
//! `run` service keeps it up until a shutdown signal; one-off CLI commands
//! open it, wait for the link and close it again.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::common::{config::Config, Result};
use crate::control::{Category, Router, SystemHandler};
use crate::ipc::{Connection, ConnectionOptions, ConnectionState};

/// A connected control link: transport plus router
pub struct Link {
    pub connection: Connection,
    pub router: Router,
    router_task: JoinHandle<()>,
}

impl Link {
    /// Build the pair, register the built-in handlers and start connecting
    pub fn open(config: &Config, socket_path: PathBuf) -> Self {
        let options = ConnectionOptions::from_config(config, socket_path);
        let (connection, inbound) = Connection::new(options);

        let router = Router::new(connection.clone());
        router.register_handler(Category::System, SystemHandler);
        let router_task = router.spawn(inbound);

        connection.connect();

        Self {
            connection,
            router,
            router_task,
        }
    }

    /// Wait for the link to come up
    pub async fn ready(&self, timeout: Duration) -> Result<()> {
        self.connection.wait_until_ready(timeout).await
    }

    /// Disconnect and stop routing
    pub async fn close(self) {
        self.connection.disconnect().await;
        self.router_task.abort();
        let _ = self.router_task.await;
    }
}

/// Run the service until SIGINT or SIGTERM
pub async fn run(config: Config, socket_path: PathBuf) -> Result<()> {
    tracing::info!(socket = %socket_path.display(), "Starting control link service");

    let link = Link::open(&config, socket_path);
    let monitor = tokio::spawn(log_transitions(link.connection.subscribe()));

    let result = wait_for_shutdown().await;

    tracing::info!("Shutting down control link");
    link.close().await;
    monitor.abort();
    tracing::info!("Service shutdown complete");

    result
}

/// Log every connection state transition
async fn log_transitions(mut transitions: broadcast::Receiver<ConnectionState>) {
    loop {
        match transitions.recv().await {
            Ok(ConnectionState::Ready) => tracing::info!("Control link ready"),
            Ok(ConnectionState::Failed(reason)) => {
                tracing::warn!(%reason, "Control link failed")
            }
            Ok(ConnectionState::Waiting(reason)) => {
                tracing::info!(%reason, "Control link waiting to reconnect")
            }
            Ok(state) => tracing::debug!(%state, "Control link state changed"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "State monitor lagged")
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down gracefully"),
        _ = sigint.recv() => tracing::info!("Received SIGINT (Ctrl+C), shutting down gracefully"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl+C, shutting down gracefully");
    Ok(())
}
