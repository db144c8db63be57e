//! API error handling and response mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use streamgate_core::GatewayError;
use thiserror::Error;

/// API-specific error type wrapping the domain error.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Core error: {0}")]
    Core(#[from] GatewayError),

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Authentication required")]
    Unauthorized,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Core(core) => match core {
                GatewayError::ValidationError { field, message } => (
                    StatusCode::BAD_REQUEST,
                    format!("Validation error in '{}': {}", field, message),
                ),
                GatewayError::AuthMissing => {
                    (StatusCode::UNAUTHORIZED, "Authentication required".to_string())
                }
                GatewayError::AuthExpired => {
                    (StatusCode::UNAUTHORIZED, "Token expired".to_string())
                }
                GatewayError::NotFound { resource } => {
                    (StatusCode::NOT_FOUND, format!("Not found: {}", resource))
                }
                // zero-byte media pipe and unplayable sessions both mean
                // "nothing could be produced right now"
                GatewayError::PipeBroken { detail } => (StatusCode::SERVICE_UNAVAILABLE, detail),
                GatewayError::SessionFailed { reason, .. } => {
                    (StatusCode::SERVICE_UNAVAILABLE, reason)
                }
                GatewayError::UpstreamTimeout { source_tag } => (
                    StatusCode::BAD_GATEWAY,
                    format!("Upstream '{}' timed out", source_tag),
                ),
                GatewayError::UpstreamProtected { host } => (
                    StatusCode::BAD_GATEWAY,
                    format!("Upstream '{}' challenge not solved", host),
                ),
                GatewayError::UpstreamMalformed { source_tag, .. } => (
                    StatusCode::BAD_GATEWAY,
                    format!("Upstream '{}' returned malformed data", source_tag),
                ),
                GatewayError::ExternalServiceError { service, .. } => (
                    StatusCode::BAD_GATEWAY,
                    format!("External service '{}' error", service),
                ),
                // internal reasons never leak to clients
                GatewayError::DatabaseError { .. } | GatewayError::Internal { .. } => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                ),
            },
            ApiError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound { resource } => {
                (StatusCode::NOT_FOUND, format!("Not found: {}", resource))
            }
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "Authentication required".to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "message": message,
                "code": status.as_u16(),
            }
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(error: ApiError) -> StatusCode {
        error.into_response().status()
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            status_of(ApiError::Core(GatewayError::ValidationError {
                field: "x".into(),
                message: "y".into()
            })),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApiError::Core(GatewayError::AuthMissing)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(ApiError::Core(GatewayError::NotFound { resource: "s".into() })),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ApiError::Core(GatewayError::PipeBroken { detail: "d".into() })),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(ApiError::Core(GatewayError::DatabaseError { message: "m".into() })),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
