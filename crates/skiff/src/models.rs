//! These models represent the objects passed around by the agent
//!
//! The message shape follows the wire format the chat templates expect:
//! role-tagged entries with optional plain content, plus the tool-call
//! request list on assistant turns and the call correlation fields on tool
//! turns. Conversations received over the API deserialize directly into
//! these structs.
pub mod message;
pub mod tool;
