/**
 * MASTER HTTP API - Control plane and operator endpoints under /api
 *
 * ROUTES :
 * - GET  /api/health                 open
 * - POST /api/nodes/register         node token (x-node-id / x-node-token)
 * - POST /api/nodes/heartbeat        node token
 * - GET  /api/nodes                  operator key (x-api-key)
 * - GET  /api/nodes/{id}             operator key
 * - POST /api/containers/schedule    operator key
 * - GET  /api/containers/all         operator key
 *
 * SECURITY :
 * - Node routes go through require_node_token, the same check workers apply to the master
 * - Operator routes compare x-api-key with the configured key in constant time; no key configured = closed
 */

use crate::aggregate::{self, AggregatedContainer};
use crate::dispatch::{self, ScheduleOutcome, ScheduleRequest};
use crate::error::ApiError;
use crate::models::NodeRecord;
use crate::state::AppState;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use dockyard_common::{keys_match, require_node_token, AuthenticatedNode, HeartbeatRequest, RegisterRequest, StatusReply};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

pub const API_KEY_HEADER: &str = "x-api-key";

pub fn build_router(app_state: AppState) -> Router {
    let node_routes = Router::new()
        .route("/nodes/register", post(register_node))
        .route("/nodes/heartbeat", post(heartbeat))
        .route_layer(middleware::from_fn_with_state(app_state.auth.clone(), require_node_token));

    let operator_routes = Router::new()
        .route("/nodes", get(list_nodes))
        .route("/nodes/{id}", get(get_node))
        .route("/containers/schedule", post(schedule))
        .route("/containers/all", get(all_containers))
        .route_layer(middleware::from_fn_with_state(app_state.clone(), require_api_key));

    let api = Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(node_routes)
        .merge(operator_routes);

    Router::new()
        .nest("/api", api)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}

async fn require_api_key(State(app): State<AppState>, req: Request, next: Next) -> Result<Response, StatusCode> {
    let Some(expected) = app.config.operator_api_key.as_deref().filter(|k| !k.is_empty()) else {
        warn!("SECURITY: no operator api key configured (DOCKYARD_API_KEY) - operator access denied");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let ok = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| keys_match(v, expected))
        .unwrap_or(false);

    if !ok {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

// POST /api/nodes/register
async fn register_node(
    State(app): State<AppState>,
    Extension(caller): Extension<AuthenticatedNode>,
    Json(req): Json<RegisterRequest>,
) -> Json<StatusReply> {
    if req.id != caller.0 {
        debug!("node {} registered on behalf of {}", caller.0, req.id);
    }
    app.registry.register(NodeRecord::from_registration(req));
    Json(StatusReply::success())
}

// POST /api/nodes/heartbeat
async fn heartbeat(
    State(app): State<AppState>,
    Extension(caller): Extension<AuthenticatedNode>,
    Json(hb): Json<HeartbeatRequest>,
) -> Json<StatusReply> {
    if hb.node_id != caller.0 {
        warn!("heartbeat for {} sent with the credentials of {}", hb.node_id, caller.0);
    }

    if let Some(revived) = app
        .registry
        .record_heartbeat(&hb.node_id, hb.cpu, hb.memory, hb.disk, hb.containers)
    {
        debug!(
            "heartbeat from {}: cpu {:.1}% mem {:.1}% disk {:.1}% containers {}",
            hb.node_id, hb.cpu, hb.memory, hb.disk, hb.containers
        );
        if revived {
            info!("node {} is back online", hb.node_id);
        }
    }
    Json(StatusReply::success())
}

// GET /api/nodes
async fn list_nodes(State(app): State<AppState>) -> Json<Vec<NodeRecord>> {
    let mut nodes = app.registry.list();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));
    Json(nodes)
}

// GET /api/nodes/{id}
async fn get_node(State(app): State<AppState>, Path(id): Path<String>) -> Result<Json<NodeRecord>, ApiError> {
    app.registry
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("node {}", id)))
}

// POST /api/containers/schedule
async fn schedule(
    State(app): State<AppState>,
    Json(req): Json<ScheduleRequest>,
) -> Result<Json<ScheduleOutcome>, ApiError> {
    dispatch::schedule(&app, req).await.map(Json)
}

// GET /api/containers/all
async fn all_containers(State(app): State<AppState>) -> Json<Vec<AggregatedContainer>> {
    Json(aggregate::collect_all(&app).await)
}
