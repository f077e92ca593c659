use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Failures surfaced to HTTP clients
#[derive(Debug)]
pub enum ApiError {
    /// Carries the path the model was expected at
    ModelNotLoaded(String),
    InvalidImage(String),
    MissingFile,
    InvalidMultipart(String),
    PayloadTooLarge(String),
    InvalidQuery(String),
    InvalidThreshold(String),
    InferenceFailed(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::ModelNotLoaded(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InvalidImage(_)
            | ApiError::InvalidMultipart(_)
            | ApiError::InvalidQuery(_)
            | ApiError::InvalidThreshold(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingFile => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::InferenceFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::ModelNotLoaded(_) => "MODEL_NOT_LOADED",
            ApiError::InvalidImage(_) => "INVALID_IMAGE",
            ApiError::MissingFile => "MISSING_FILE",
            ApiError::InvalidMultipart(_) => "INVALID_MULTIPART",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::InvalidQuery(_) => "INVALID_QUERY",
            ApiError::InvalidThreshold(_) => "INVALID_THRESHOLD",
            ApiError::InferenceFailed(_) => "INFERENCE_FAILED",
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::ModelNotLoaded(path) => write!(
                f,
                "Model not loaded. Place the exported Mask R-CNN model at {} or set MODEL_PATH.",
                path
            ),
            ApiError::InvalidImage(msg) => write!(f, "Could not decode image: {}", msg),
            ApiError::MissingFile => write!(f, "Multipart field 'file' is required"),
            ApiError::InvalidMultipart(msg) => write!(f, "Invalid multipart upload: {}", msg),
            ApiError::PayloadTooLarge(msg) => write!(f, "Upload too large: {}", msg),
            ApiError::InvalidQuery(msg) => write!(f, "Invalid query parameters: {}", msg),
            ApiError::InvalidThreshold(msg) => write!(f, "{}", msg),
            ApiError::InferenceFailed(msg) => write!(f, "Inference failed: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("Request failed: {}", self);
        }

        let body = ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
