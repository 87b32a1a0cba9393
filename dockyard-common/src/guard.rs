use crate::auth::{NodeAuthenticator, NODE_ID_HEADER, NODE_TOKEN_HEADER};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use tracing::warn;

/// Node id that passed token verification, available to handlers as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedNode(pub String);

/// Rejects control-plane calls whose `X-Node-ID` / `X-Node-Token` pair does not verify.
///
/// Use with `axum::middleware::from_fn_with_state(authenticator, require_node_token)`.
pub async fn require_node_token(
    State(auth): State<Arc<NodeAuthenticator>>,
    mut req: Request,
    next: Next,
) -> Response {
    // owned values only, the request itself is moved into `next.run` below
    let (node_id, token) = {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };
        (header(NODE_ID_HEADER), header(NODE_TOKEN_HEADER))
    };

    let (Some(node_id), Some(token)) = (node_id, token) else {
        return unauthorized("node authentication failed: missing node id or token");
    };

    if !auth.verify(&node_id, &token) {
        warn!("rejected control-plane call to {} from node {}", req.uri().path(), node_id);
        return unauthorized("node authentication failed: invalid token");
    }

    req.extensions_mut().insert(AuthenticatedNode(node_id));
    next.run(req).await
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(serde_json::json!({ "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::VerifyPolicy;
    use axum::body::Body;
    use axum::routing::get;
    use axum::{Extension, Router};
    use tower::ServiceExt;

    fn app(auth: Arc<NodeAuthenticator>) -> Router {
        Router::new()
            .route("/whoami", get(|Extension(node): Extension<AuthenticatedNode>| async move { node.0 }))
            .layer(axum::middleware::from_fn_with_state(auth, require_node_token))
    }

    #[tokio::test]
    async fn test_missing_headers_are_rejected() {
        let auth = Arc::new(NodeAuthenticator::new("s", VerifyPolicy::default()));
        let response = app(auth)
            .oneshot(Request::builder().uri("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_invalid_token_is_rejected() {
        let auth = Arc::new(NodeAuthenticator::new("s", VerifyPolicy::default()));
        let forged = NodeAuthenticator::new("other", VerifyPolicy::default()).mint("worker-1");
        let response = app(auth)
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header(NODE_ID_HEADER, "worker-1")
                    .header(NODE_TOKEN_HEADER, forged)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_valid_token_passes_node_id_through() {
        let auth = Arc::new(NodeAuthenticator::new("s", VerifyPolicy::default()));
        let token = auth.mint("worker-1");
        let response = app(auth)
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header(NODE_ID_HEADER, "worker-1")
                    .header(NODE_TOKEN_HEADER, token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"worker-1");
    }

    #[tokio::test]
    async fn test_guarded_router_runs_on_a_spawned_task() {
        let auth = Arc::new(NodeAuthenticator::new("s", VerifyPolicy::default()));
        let token = auth.mint("worker-2");
        let router = Router::new()
            .route("/whoami", get(|Extension(node): Extension<AuthenticatedNode>| async move { node.0 }))
            .route_layer(axum::middleware::from_fn_with_state(auth, require_node_token));

        let request = Request::builder()
            .uri("/whoami")
            .header(NODE_ID_HEADER, "worker-2")
            .header(NODE_TOKEN_HEADER, token)
            .body(Body::empty())
            .unwrap();
        let response = tokio::spawn(router.oneshot(request)).await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
