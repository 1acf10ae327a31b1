use crate::errors::AgentResult;
use crate::models::message::{Message, ToolCallFunction};
use crate::models::tool::Tool;

/// Chat-template binding for one family of models.
///
/// A format knows how to serialize a conversation (and the tool catalog)
/// into the text the completion endpoint expects, how to find structured
/// calls in raw model output, and whether calls carry correlation ids.
pub trait ChatFormat: Send + Sync {
    /// Render the conversation into the model's native prompt text, ending
    /// with the generation prompt for the next assistant turn.
    fn render(&self, messages: &[Message], tools: &[Tool]) -> AgentResult<String>;

    /// Extract structured calls from raw model output, in order of
    /// appearance. A malformed payload fails the whole extraction.
    fn extract_tool_calls(&self, response: &str) -> AgentResult<Vec<ToolCallFunction>>;

    /// Mint a correlation id for one call; None for formats without ids.
    fn next_call_id(&self) -> Option<String>;
}
