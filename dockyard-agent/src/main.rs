//! Dockyard Agent - worker node process
//!
//! Starts the worker API, registers with the master and keeps heartbeating
//! until ctrl-c.

use anyhow::{Context, Result};
use dockyard_agent::{build_router, AgentConfig, ControlPlaneClient, NodeIdentity, WorkerState};
use dockyard_common::{ContainerRuntime, DockerCli, NodeAuthenticator};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dockyard_agent=info")))
        .init();

    info!("Dockyard agent starting...");

    let config = AgentConfig::load().await.context("Failed to load agent config")?;
    let auth = Arc::new(NodeAuthenticator::from_env(config.auth.verify));
    info!("Node token policy: {:?}", auth.policy());
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(DockerCli::default());
    let identity = NodeIdentity::discover(&config);

    let client = ControlPlaneClient::new(&config.master_url, auth.clone(), identity, runtime.clone(), config.request_timeout())
        .context("Failed to create control-plane client")?
        .with_labels(config.labels.clone())
        .with_heartbeat_interval(config.heartbeat_interval())
        .with_registration_retry(config.registration_retry());

    let listen = config.listen_addr();
    let listener = TcpListener::bind(&listen)
        .await
        .with_context(|| format!("Failed to bind {}", listen))?;
    info!("Worker API listening on http://{}", listen);

    let shutdown = CancellationToken::new();
    let control_plane = tokio::spawn(client.run(shutdown.clone()));

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                signal.cancel();
            }
            Err(e) => error!("Failed to listen for ctrl-c: {}", e),
        }
    });

    let app = build_router(WorkerState { auth, runtime });
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await
        .context("Worker API failed")?;

    shutdown.cancel();
    control_plane.await.ok();
    info!("Dockyard agent stopped");
    Ok(())
}
