use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionChain {
    Base,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionAccount {
    pub address: String,
    pub chain: SubscriptionChain,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAgentBody {
    pub subscription_id: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SetupAgentBody {
    pub subscription_id: String,
    pub password: String,
    pub account: SubscriptionAccount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateAgentResponse {
    pub vm_hash: String,
}

/// The agent record persisted as a channel post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: String,
    pub subscription_id: String,
    pub vm_hash: Option<String>,
    /// Sealed secret, base64 encoded to survive storage on the network
    pub encrypted_secret: String,
    pub last_update: i64,
    pub tags: Vec<String>,
}

/// An agent record together with the hash of the post carrying it
#[derive(Debug, Clone)]
pub struct FetchedAgent {
    pub record: AgentRecord,
    pub post_hash: String,
}
