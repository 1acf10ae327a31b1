use std::sync::Arc;

use skiff::agent::Agent;

/// Shared application state: one agent serves all conversations. The agent
/// is read-only after construction, so sharing it across request tasks is
/// just reference counting.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
}

impl AppState {
    pub fn new(agent: Agent) -> Self {
        AppState {
            agent: Arc::new(agent),
        }
    }
}
