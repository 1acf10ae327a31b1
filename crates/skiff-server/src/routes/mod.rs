// Export route modules
pub mod answer;
pub mod model;

use crate::state::AppState;
use axum::Router;

// Function to configure all routes
pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(answer::routes(state.clone()))
        .merge(model::routes(state))
}
