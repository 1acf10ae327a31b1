use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::secrets::SecretError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error(transparent)]
    Other(#[from] config::ConfigError),
}

/// Map a config field path ("aleph.sender_key") onto its env var name
pub fn to_env_var(field: &str) -> String {
    format!("SKIFF_{}", field.replace('.', "__").to_uppercase())
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Invalid password, you are not authorized to call this route")]
    InvalidPassword,

    #[error("Agent with ID {0} not found")]
    AgentNotFound(String),

    #[error("The secret provided doesn't match the one of this agent")]
    SecretMismatch,

    #[error("Program message {0} not found")]
    ProgramNotFound(String),

    #[error("Missing form field: {0}")]
    MissingField(&'static str),

    #[error("Malformed upload: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error("Request to the network failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Node returned status {status}")]
    Node { status: u16 },

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

impl BackendError {
    fn status(&self) -> StatusCode {
        match self {
            BackendError::InvalidPassword | BackendError::SecretMismatch => {
                StatusCode::UNAUTHORIZED
            }
            BackendError::AgentNotFound(_) => StatusCode::NOT_FOUND,
            BackendError::MissingField(_) | BackendError::Multipart(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            BackendError::Request(_) | BackendError::Node { .. } => StatusCode::BAD_GATEWAY,
            BackendError::ProgramNotFound(_)
            | BackendError::Secret(_)
            | BackendError::Signing(_)
            | BackendError::Serde(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
