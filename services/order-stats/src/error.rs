//! HTTP-facing error type for the query boundary

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced to query callers.
///
/// Backend unavailability is reported explicitly so the caller can apply
/// its own retry policy; it is never papered over with a stale success.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Stats backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, message, code) = match self {
            ServiceError::BackendUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, msg, "BACKEND_UNAVAILABLE")
            }
            ServiceError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg, "INTERNAL_ERROR")
            }
        };

        let body = Json(json!({
            "error": code,
            "message": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_unavailable_maps_to_503() {
        let response =
            ServiceError::BackendUnavailable("aggregation view offline".to_string())
                .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
