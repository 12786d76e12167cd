use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use edgesync_core::error::EdgeSyncError;
use serde_json::json;
use thiserror::Error;

/// Server-level error type covering all subsystems.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A repository or replica failed.
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ServerError::BadRequest(msg)
            | ServerError::Unauthorized(msg)
            | ServerError::Forbidden(msg)
            | ServerError::NotFound(msg)
            | ServerError::BadGateway(msg)
            | ServerError::Internal(msg) => msg,
        };

        if status.is_server_error() {
            tracing::warn!(%status, error = %message, "request failed");
        }

        let body = json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<EdgeSyncError> for ServerError {
    fn from(err: EdgeSyncError) -> Self {
        match err {
            EdgeSyncError::Client(msg) => ServerError::BadRequest(msg),
            EdgeSyncError::Unauthorized(msg) => ServerError::Unauthorized(msg),
            EdgeSyncError::Forbidden(msg) => ServerError::Forbidden(msg),
            EdgeSyncError::NotFound(msg) => ServerError::NotFound(msg),
            e @ EdgeSyncError::Dependency { .. } => ServerError::BadGateway(e.to_string()),
            EdgeSyncError::Storage(msg) | EdgeSyncError::Corruption(msg) | EdgeSyncError::Serialization(msg) => {
                ServerError::Internal(msg)
            }
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for ServerError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        ServerError::BadRequest(format!("bad multipart body: {err}"))
    }
}
