/**
 * CONTROL PLANE CLIENT - Worker side of membership
 *
 * ROLE : register this node with the master once at startup, then report load on a
 * fixed interval. Every call carries a token minted for that call.
 *
 * FAILURES : logged and skipped, the loop never stops on its own. A failed initial
 * registration leaves the node unknown to the master (its heartbeats are ignored)
 * unless `registration_retry` is set, in which case it is retried until it lands once.
 */

use crate::discovery::NodeIdentity;
use crate::metrics::ResourceSample;
use dockyard_common::{
    ContainerRuntime, HeartbeatRequest, NodeAuthenticator, NodeRole, RegisterRequest, NODE_ID_HEADER,
    NODE_TOKEN_HEADER,
};
use reqwest::Client;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{interval, interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to build http client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("master unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("master answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

pub struct ControlPlaneClient {
    http: Client,
    master_url: String,
    auth: Arc<NodeAuthenticator>,
    identity: NodeIdentity,
    labels: HashMap<String, String>,
    runtime: Arc<dyn ContainerRuntime>,
    heartbeat_interval: Duration,
    registration_retry: Option<Duration>,
}

impl ControlPlaneClient {
    pub fn new(
        master_url: &str,
        auth: Arc<NodeAuthenticator>,
        identity: NodeIdentity,
        runtime: Arc<dyn ContainerRuntime>,
        request_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(request_timeout).build().map_err(ClientError::Build)?;
        Ok(Self {
            http,
            master_url: master_url.trim_end_matches('/').to_string(),
            auth,
            identity,
            labels: HashMap::new(),
            runtime,
            heartbeat_interval: Duration::from_secs(5),
            registration_retry: None,
        })
    }

    pub fn with_labels(mut self, labels: HashMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_heartbeat_interval(mut self, every: Duration) -> Self {
        self.heartbeat_interval = every;
        self
    }

    pub fn with_registration_retry(mut self, every: Option<Duration>) -> Self {
        self.registration_retry = every;
        self
    }

    /// `POST /api/nodes/register` with this node's identity.
    pub async fn register(&self) -> Result<(), ClientError> {
        let body = RegisterRequest {
            id: self.identity.id.clone(),
            name: self.identity.name.clone(),
            address: self.identity.address.clone(),
            role: NodeRole::Worker,
            labels: self.labels.clone(),
        };
        self.post("/api/nodes/register", &body).await?;

        info!("Registered with master {} as {}", self.master_url, self.identity.id);
        Ok(())
    }

    /// `POST /api/nodes/heartbeat` with `sample` and the current container count.
    pub async fn heartbeat(&self, sample: &ResourceSample) -> Result<(), ClientError> {
        let containers = match self.runtime.count().await {
            Ok(n) => u32::try_from(n).unwrap_or(u32::MAX),
            Err(e) => {
                debug!("Container count unavailable, reporting 0: {}", e);
                0
            }
        };

        let body = HeartbeatRequest {
            node_id: self.identity.id.clone(),
            cpu: sample.cpu,
            memory: sample.memory,
            disk: sample.disk,
            containers,
        };
        self.post("/api/nodes/heartbeat", &body).await?;

        debug!("Heartbeat sent");
        Ok(())
    }

    /// Registers once, then heartbeats until `shutdown` is cancelled.
    ///
    /// With `registration_retry` set, a failed registration is retried on that
    /// period until it succeeds; a registered node is never re-registered.
    pub async fn run(self, shutdown: CancellationToken) {
        let registered = match self.register().await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to register with master: {}", e);
                false
            }
        };

        let mut heartbeat_timer = interval(self.heartbeat_interval);
        heartbeat_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick fires at once, registration just happened
        heartbeat_timer.tick().await;

        let mut registration_timer = match (registered, self.registration_retry) {
            (false, Some(every)) => Some(interval_at(Instant::now() + every, every)),
            _ => None,
        };

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,

                _ = heartbeat_timer.tick() => {
                    let sample = ResourceSample::collect().await;
                    if let Err(e) = self.heartbeat(&sample).await {
                        warn!("Failed to send heartbeat: {}", e);
                    }
                }

                _ = next_tick(&mut registration_timer) => {
                    match self.register().await {
                        Ok(()) => registration_timer = None,
                        Err(e) => error!("Failed to re-register: {}", e),
                    }
                }
            }
        }

        info!("Control-plane client stopped");
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<(), ClientError> {
        let response = self
            .http
            .post(format!("{}{}", self.master_url, path))
            .header(NODE_ID_HEADER, &self.identity.id)
            .header(NODE_TOKEN_HEADER, self.auth.mint(&self.identity.id))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Ticks `timer`, or never resolves when there is none.
async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}
