use std::sync::Arc;

use crate::aleph::AlephClient;
use crate::secrets::SecretSealer;

/// Shared application state. Everything here is read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub aleph: Arc<AlephClient>,
    pub sealer: Arc<SecretSealer>,
    pub password: String,
    pub agent_post_type: String,
    pub gateway_url: String,
}
