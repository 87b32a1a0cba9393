/**
 * DOCKYARD MASTER - Entry point of the control node
 *
 * ROLE : load config, build the shared state, start the heartbeat monitor and
 * serve the HTTP API until ctrl-c.
 */

use anyhow::Context;
use dockyard_common::{DockerCli, NodeAuthenticator};
use dockyard_master::config::load_config;
use dockyard_master::{build_router, AppState, HeartbeatMonitor};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dockyard_master=info")))
        .init();

    let cfg = load_config().await;
    let auth = Arc::new(NodeAuthenticator::from_env(cfg.auth.verify));
    info!("node token policy: {:?}", auth.policy());
    let listen = cfg.listen.clone();
    let monitor_timing = (cfg.sweep_interval(), cfg.node_timeout());

    let app_state = AppState::new(cfg, auth, Arc::new(DockerCli::default())).context("failed to build master state")?;

    let shutdown = CancellationToken::new();
    let monitor = HeartbeatMonitor::new(app_state.registry.clone(), monitor_timing.0, monitor_timing.1)
        .spawn(shutdown.clone());

    let app = build_router(app_state);

    let listener = TcpListener::bind(&listen)
        .await
        .with_context(|| format!("failed to bind {}", listen))?;
    info!("dockyard master listening on http://{}", listen);

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested");
                signal.cancel();
            }
            Err(e) => error!("failed to listen for ctrl-c: {}", e),
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await
        .context("http server failed")?;

    shutdown.cancel();
    monitor.await.ok();
    info!("dockyard master stopped");
    Ok(())
}
