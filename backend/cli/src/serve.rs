use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info, warn};

use courier_config::CourierConfig;
use courier_gateway::{start_server, GatewayState};
use courier_supervisor::{FileCredentialStore, FileTaskStore, Supervisor};

use crate::loopback::LoopbackClient;

pub async fn run_server(config: CourierConfig, config_path: PathBuf) -> Result<()> {
    let addr: SocketAddr = config
        .server
        .address()
        .parse()
        .with_context(|| format!("invalid listen address {}", config.server.address()))?;

    info!(
        addr = %addr,
        config = %config_path.display(),
        data_dir = %config.storage.data_dir.display(),
        "Starting Courier"
    );

    let credentials = Arc::new(FileCredentialStore::new(config.storage.credentials_path()));
    let store = Arc::new(FileTaskStore::new(config.storage.tasks_path()));
    let supervisor = Arc::new(Supervisor::new(
        Arc::new(LoopbackClient::new()),
        credentials,
        store,
        config.task_limits(),
    ));

    match supervisor.restore().await {
        Ok(report) => info!(
            restored = report.restored,
            resumed = report.resumed,
            "Loaded saved tasks"
        ),
        Err(e) => error!(error = %e, "Error loading saved tasks; starting with none"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let background = supervisor.spawn_background(shutdown_rx);

    let served = start_server(
        addr,
        GatewayState::new(Arc::clone(&supervisor)),
        shutdown_signal(),
    )
    .await;
    if let Err(e) = &served {
        error!(error = %e, "HTTP server failed");
    }

    let _ = shutdown_tx.send(true);
    for job in background {
        if let Err(e) = job.await {
            warn!(error = %e, "Background job ended abnormally");
        }
    }
    supervisor.shutdown().await;
    info!("Courier stopped");

    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
