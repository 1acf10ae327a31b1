use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use skiff::errors::AgentError;
use thiserror::Error;

/// Failures surfaced on the agent API, mapped to class-specific status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// Caller errors are 4xx, upstream model failures are 502, the rest is 500
pub fn status_for(error: &AgentError) -> StatusCode {
    match error {
        AgentError::InvalidConversationState(_) => StatusCode::BAD_REQUEST,
        AgentError::ContextOverflow { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        AgentError::ModelUnavailable { .. }
        | AgentError::Request(_)
        | AgentError::MalformedCompletion(_)
        | AgentError::ToolCallParse(_)
        | AgentError::ToolCallDepthExceeded(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Agent(error) = self;
        let status = status_for(&error);
        if status.is_server_error() {
            tracing::error!(%error, "request failed");
        }
        (status, Json(json!({ "error": error.to_string() }))).into_response()
    }
}
