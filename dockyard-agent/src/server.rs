//! Worker HTTP API: what the master calls on this node.
//!
//! Container routes require a node token; `/api/health` is open.

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use dockyard_common::{
    require_node_token, AuthenticatedNode, ContainerRuntime, ContainerSummary, CreatedWorkload, NodeAuthenticator,
    RuntimeError, WorkloadSpec,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Clone)]
pub struct WorkerState {
    pub auth: Arc<NodeAuthenticator>,
    pub runtime: Arc<dyn ContainerRuntime>,
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("image is required")]
    MissingImage,
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl IntoResponse for WorkerError {
    fn into_response(self) -> Response {
        let status = match self {
            WorkerError::MissingImage => StatusCode::BAD_REQUEST,
            WorkerError::Runtime(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn build_router(state: WorkerState) -> Router {
    let containers = Router::new()
        .route("/containers", get(list_containers))
        .route("/containers/create", post(create_container))
        .route_layer(middleware::from_fn_with_state(state.auth.clone(), require_node_token));

    let api = Router::new().route("/health", get(|| async { "ok" })).merge(containers);

    Router::new().nest("/api", api).with_state(state)
}

// GET /api/containers
async fn list_containers(State(state): State<WorkerState>) -> Result<Json<Vec<ContainerSummary>>, WorkerError> {
    let containers = state.runtime.list().await.map_err(|e| {
        error!("Failed to list containers: {}", e);
        e
    })?;
    Ok(Json(containers))
}

// POST /api/containers/create
async fn create_container(
    State(state): State<WorkerState>,
    Extension(caller): Extension<AuthenticatedNode>,
    Json(spec): Json<WorkloadSpec>,
) -> Result<Json<CreatedWorkload>, WorkerError> {
    if spec.image.trim().is_empty() {
        return Err(WorkerError::MissingImage);
    }

    info!("Starting {} ({}) on request of {}", spec.name, spec.image, caller.0);
    let created = state.runtime.create(&spec).await.map_err(|e| {
        error!("Failed to start {}: {}", spec.image, e);
        e
    })?;
    Ok(Json(created))
}
