//! Core error types for the Streamgate domain

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Validation error: {field} - {message}")]
    ValidationError { field: String, message: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Authentication required")]
    AuthMissing,

    #[error("Authentication token expired")]
    AuthExpired,

    #[error("Upstream '{source_tag}' timed out")]
    UpstreamTimeout { source_tag: String },

    #[error("Upstream '{host}' is challenge-protected and the bypass failed")]
    UpstreamProtected { host: String },

    #[error("Upstream '{source_tag}' returned a malformed response: {detail}")]
    UpstreamMalformed { source_tag: String, detail: String },

    #[error("Session {info_hash} failed: {reason}")]
    SessionFailed { info_hash: String, reason: String },

    #[error("Media pipe broken: {detail}")]
    PipeBroken { detail: String },

    #[error("External service error: {service} - {error}")]
    ExternalServiceError { service: String, error: String },

    #[error("Database error: {message}")]
    DatabaseError { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// True for errors that the aggregator swallows into an empty result.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            GatewayError::UpstreamTimeout { .. }
                | GatewayError::UpstreamProtected { .. }
                | GatewayError::UpstreamMalformed { .. }
                | GatewayError::ExternalServiceError { .. }
        )
    }
}
