use std::env;
use std::sync::Arc;

use droid_queue_rs::api::{AppState, QueueServer};
use droid_queue_rs::helpers::init_tracing;
use droid_queue_rs::task::drain;
use droid_queue_rs::{Sequencer, ServerConfig, TaskStore, WorkerProcess};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let config = ServerConfig::from_env().with_args(&args);

    let store = Arc::new(TaskStore::new(config.queue_capacity));
    let worker = WorkerProcess::new(config.worker());
    let sequencer = Sequencer::new(store.clone(), worker).spawn();

    let state = AppState::new(store.clone(), config.server_key.clone());
    info!(
        port = config.port,
        worker = %config.worker().describe(),
        capacity = config.queue_capacity,
        auth = if config.server_key.is_some() { "enabled" } else { "disabled" },
        "droid-queue starting"
    );

    let server = QueueServer::new(config.port, state);
    let served = server.start(shutdown_signal()).await;
    if let Err(err) = &served {
        warn!(error = %err, "server stopped with error");
    }

    info!("shutting down, draining queue");
    drain(&store, sequencer, config.shutdown_grace).await;
    info!("server stopped");
    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(%err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
