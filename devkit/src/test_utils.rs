/*!
Test helpers

- `init_tracing`: log to the test output once per process
- `signed_request` / `operator_request`: requests carrying node or operator credentials
- `StaticRuntime`: container runtime backed by memory
*/

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use dockyard_common::{
    ContainerRuntime, ContainerSummary, CreatedWorkload, NodeAuthenticator, RuntimeError, WorkloadSpec,
    NODE_ID_HEADER, NODE_TOKEN_HEADER,
};
use parking_lot::Mutex;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

/// Request signed as `node_id` with a token minted now. `body` is sent as JSON when present.
pub fn signed_request<T: Serialize>(
    auth: &NodeAuthenticator,
    node_id: &str,
    method: &str,
    uri: &str,
    body: Option<&T>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(NODE_ID_HEADER, node_id)
        .header(NODE_TOKEN_HEADER, auth.mint(node_id));
    finish(builder, body)
}

/// Request carrying the operator api key.
pub fn operator_request<T: Serialize>(api_key: &str, method: &str, uri: &str, body: Option<&T>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri).header("x-api-key", api_key);
    finish(builder, body)
}

fn finish<T: Serialize>(builder: axum::http::request::Builder, body: Option<&T>) -> Request<Body> {
    let result = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap_or_default())),
        None => builder.body(Body::empty()),
    };
    result.unwrap_or_else(|e| panic!("invalid test request: {}", e))
}

/// In-memory runtime: lists a fixed set, records what it was asked to create.
#[derive(Debug, Default)]
pub struct StaticRuntime {
    containers: Mutex<Vec<ContainerSummary>>,
    created: Mutex<Vec<WorkloadSpec>>,
    broken: bool,
}

impl StaticRuntime {
    pub fn new(containers: Vec<ContainerSummary>) -> Self {
        Self {
            containers: Mutex::new(containers),
            ..Default::default()
        }
    }

    /// A runtime whose every call fails, like a stopped docker daemon.
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Default::default()
        }
    }

    pub fn created(&self) -> Vec<WorkloadSpec> {
        self.created.lock().clone()
    }

    fn check(&self, command: &str) -> Result<(), RuntimeError> {
        if self.broken {
            return Err(RuntimeError::Failed {
                command: command.to_string(),
                stderr: "runtime unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for StaticRuntime {
    async fn list(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        self.check("list")?;
        Ok(self.containers.lock().clone())
    }

    async fn create(&self, spec: &WorkloadSpec) -> Result<CreatedWorkload, RuntimeError> {
        self.check("create")?;
        let mut created = self.created.lock();
        created.push(spec.clone());
        let id = format!("{:012x}", created.len());

        self.containers.lock().push(ContainerSummary {
            id: id.clone(),
            name: spec.name.clone(),
            image: spec.image.clone(),
            status: "Up 1 second".to_string(),
            state: "running".to_string(),
        });

        Ok(CreatedWorkload {
            status: "success".to_string(),
            id,
            name: spec.name.clone(),
        })
    }
}
