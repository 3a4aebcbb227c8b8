//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// JSON error body sent to the client.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Optional payload with more detail (upstream output, field name, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("you are not authenticated")]
    AuthRequired,

    #[error("your session has expired")]
    AuthExpired,

    #[error("unable to refresh the session token: {0}")]
    TransientAuth(String),

    #[error("upstream service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("the repository is not accessible: {0}")]
    SinkNotReady(String),

    #[error("unable to transform the file")]
    EngineRejected(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("staging error: {0}")]
    Staging(#[from] graftgate_staging::StagingError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::AuthRequired | Self::AuthExpired => StatusCode::UNAUTHORIZED,
            Self::TransientAuth(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::SinkNotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::EngineRejected(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotSupported(_) => StatusCode::NOT_IMPLEMENTED,
            Self::Staging(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Extra payload for the error body.
    pub fn data(&self) -> Option<serde_json::Value> {
        match self {
            Self::EngineRejected(output) => Some(serde_json::Value::String(output.clone())),
            _ => None,
        }
    }

    /// Build the JSON body for this error.
    pub fn body(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
            data: self.data(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
