//! HTTP error handling and response mapping.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use legal_engine::GenerationError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("generation exceeded {0:?}")]
    Timeout(Duration),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::Generation(
                GenerationError::Tokenization(_) | GenerationError::InvalidParams(_),
            ) => (StatusCode::BAD_REQUEST, "invalid_request_error"),
            ServerError::Generation(GenerationError::Cancelled) => {
                (StatusCode::SERVICE_UNAVAILABLE, "server_error")
            }
            ServerError::Generation(_) | ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "server_error")
            }
            ServerError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout_error"),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.classify();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(%status, "{message}");
        } else {
            tracing::warn!(%status, "{message}");
        }

        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
            }
        }));

        (status, body).into_response()
    }
}
