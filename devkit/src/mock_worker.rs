/*!
Mock worker for master-side tests

Serves the worker API (`/api/containers`, `/api/containers/create`) on a loopback
port behind the real node-token guard, and records every authenticated call so
tests can assert on what the master sent.
*/

use anyhow::Result;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use dockyard_common::{
    require_node_token, AuthenticatedNode, ContainerSummary, CreatedWorkload, NodeAuthenticator, WorkloadSpec,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// One call that got past the token guard.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: String,
    pub path: String,
    pub node_id: String,
    pub body: Value,
}

#[derive(Clone)]
struct MockState {
    containers: Vec<ContainerSummary>,
    delay: Option<Duration>,
    fail_status: Option<StatusCode>,
    requests: Arc<Mutex<Vec<MockRequest>>>,
}

#[derive(Default)]
pub struct MockWorkerBuilder {
    containers: Vec<ContainerSummary>,
    delay: Option<Duration>,
    fail_status: Option<u16>,
}

impl MockWorkerBuilder {
    pub fn with_containers(mut self, containers: Vec<ContainerSummary>) -> Self {
        self.containers = containers;
        self
    }

    /// Every reply is held back this long.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every authenticated call answers `status` with a plain-text body.
    pub fn failing_with(mut self, status: u16) -> Self {
        self.fail_status = Some(status);
        self
    }

    /// Binds 127.0.0.1 on an ephemeral port and starts serving.
    pub async fn start(self, auth: Arc<NodeAuthenticator>) -> Result<MockWorker> {
        let state = MockState {
            containers: self.containers,
            delay: self.delay,
            fail_status: self.fail_status.map(StatusCode::from_u16).transpose()?,
            requests: Arc::new(Mutex::new(Vec::new())),
        };

        let app = Router::new()
            .route("/api/containers", get(list_containers))
            .route("/api/containers/create", post(create_container))
            .route_layer(middleware::from_fn_with_state(state.clone(), delay_or_fail))
            .route_layer(middleware::from_fn_with_state(auth, require_node_token))
            .route("/api/health", get(|| async { "ok" }))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::warn!("[mock worker] server stopped: {}", e);
            }
        });

        tracing::info!("[mock worker] listening on {}", addr);
        Ok(MockWorker {
            addr,
            requests: state.requests,
            handle,
        })
    }
}

/// A running mock worker. The server stops when this is dropped.
pub struct MockWorker {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<MockRequest>>>,
    handle: JoinHandle<()>,
}

impl MockWorker {
    pub fn builder() -> MockWorkerBuilder {
        MockWorkerBuilder::default()
    }

    /// `host:port`, the form nodes register with.
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn requests(&self) -> Vec<MockRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<MockRequest> {
        self.requests.lock().iter().filter(|r| r.path == path).cloned().collect()
    }
}

impl Drop for MockWorker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn delay_or_fail(State(state): State<MockState>, req: Request, next: Next) -> Response {
    if let Some(delay) = state.delay {
        tokio::time::sleep(delay).await;
    }
    if let Some(status) = state.fail_status {
        return (status, "mock worker failure").into_response();
    }
    next.run(req).await
}

async fn list_containers(
    State(state): State<MockState>,
    Extension(caller): Extension<AuthenticatedNode>,
) -> Json<Vec<ContainerSummary>> {
    state.requests.lock().push(MockRequest {
        method: "GET".into(),
        path: "/api/containers".into(),
        node_id: caller.0,
        body: Value::Null,
    });
    Json(state.containers.clone())
}

async fn create_container(
    State(state): State<MockState>,
    Extension(caller): Extension<AuthenticatedNode>,
    Json(spec): Json<WorkloadSpec>,
) -> Json<CreatedWorkload> {
    let body = serde_json::to_value(&spec).unwrap_or(Value::Null);
    state.requests.lock().push(MockRequest {
        method: "POST".into(),
        path: "/api/containers/create".into(),
        node_id: caller.0,
        body,
    });
    Json(CreatedWorkload {
        status: "success".into(),
        id: "0123456789ab".into(),
        name: spec.name,
    })
}
