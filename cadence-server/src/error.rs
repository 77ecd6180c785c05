use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cadence_engine::RelayError;
use serde_json::json;
use thiserror::Error;

/// Startup and configuration failures
#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Initialization failed: {0}")]
    Initialization(String),
}

/// Request failure rendered as a JSON error body
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    kind: &'static str,
    retryable: bool,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            kind: "invalid_input",
            retryable: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<RelayError> for ApiError {
    fn from(error: RelayError) -> Self {
        let status = if matches!(error, RelayError::InvalidInput(_)) {
            StatusCode::BAD_REQUEST
        } else if error.is_not_found() {
            StatusCode::NOT_FOUND
        } else if error.is_timeout() {
            StatusCode::GATEWAY_TIMEOUT
        } else {
            StatusCode::BAD_GATEWAY
        };

        Self {
            status,
            message: error.to_string(),
            kind: error.kind(),
            retryable: error.is_retryable(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.message,
            "kind": self.kind,
            "retryable": self.retryable,
        });
        (self.status, Json(body)).into_response()
    }
}
