use crate::peer::PeerError;
use crate::placement::PlacementError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Errors surfaced by the master's HTTP handlers, rendered as `{"error": "..."}`.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("no online node available")]
    NoNodeAvailable,
    #[error("node not found: {0}")]
    UnknownNode(String),
    #[error("node not online: {0}")]
    NodeNotOnline(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("worker call failed: {0}")]
    Upstream(PeerError),
    #[error("worker error: {body}")]
    UpstreamStatus { status: u16, body: String },
}

impl From<PlacementError> for ApiError {
    fn from(err: PlacementError) -> Self {
        match err {
            PlacementError::NoNodeAvailable => ApiError::NoNodeAvailable,
        }
    }
}

impl From<PeerError> for ApiError {
    fn from(err: PeerError) -> Self {
        match err {
            PeerError::Status { status, body, .. } => ApiError::UpstreamStatus { status, body },
            other => ApiError::Upstream(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = match &self {
            ApiError::NoNodeAvailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::UnknownNode(_) => StatusCode::BAD_REQUEST,
            ApiError::NodeNotOnline(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::UpstreamStatus { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
        };

        (status_code, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::NoNodeAvailable.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ApiError::UnknownNode("x".into()).into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NodeNotOnline("x".into()).into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::UpstreamStatus { status: 409, body: "taken".into() }.into_response().status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_worker_status_passes_through() {
        let err: ApiError = PeerError::Status {
            node: "w".into(),
            status: 500,
            body: "docker down".into(),
        }
        .into();
        assert_eq!(err.to_string(), "worker error: docker down");
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
