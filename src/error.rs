use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::path::PathBuf;

/// Failures while loading artifacts or running inference.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Missing model files: {}", .0.join(", "))]
    MissingFiles(Vec<String>),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid artifact: {0}")]
    Invalid(String),

    #[error("feature length mismatch: got {got}, expected {expected}")]
    FeatureMismatch { got: usize, expected: usize },

    #[error("{model} produced a non-finite value")]
    NonFinite { model: &'static str },
}

/// Errors surfaced by the HTTP layer, each mapped to a status code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Prediction failed: {0}")]
    Inference(#[from] ModelError),

    #[error("Failed to save prediction: {0}")]
    Persistence(#[source] sqlx::Error),

    #[error("{0}")]
    Database(#[from] sqlx::Error),

    #[error("Endpoint not found")]
    NotFound,
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Inference(_) | Self::Persistence(_) | Self::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(%status, "{message}");
        } else {
            tracing::warn!(%status, "{message}");
        }
        (status, Json(json!({ "error": message, "success": false }))).into_response()
    }
}
