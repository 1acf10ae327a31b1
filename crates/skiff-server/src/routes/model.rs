use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use skiff::model::ModelInfo;

use crate::state::AppState;

/// Information about the model powering this agent
async fn model_information(State(state): State<AppState>) -> Json<ModelInfo> {
    Json(state.agent.model_info())
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/model", get(model_information))
        .with_state(state)
}
