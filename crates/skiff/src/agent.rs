use futures::future::join_all;
use futures::stream::BoxStream;
use tracing::warn;

use crate::completion::base::{CompletionBackend, CompletionParams};
use crate::errors::{AgentError, AgentResult};
use crate::model::{ChatModel, ModelInfo};
use crate::models::message::{Message, MessageToolCall, Role, ToolCallFunction};
use crate::models::tool::ToolRegistry;

/// Default bound on tool call rounds within one reply
pub const DEFAULT_MAX_TOOL_CALL_DEPTH: usize = 3;

/// Agent answering conversations by iterating model completions and the
/// tool calls they request
pub struct Agent {
    model: ChatModel,
    completion: Box<dyn CompletionBackend>,
    system_prompt: Option<String>,
    tools: ToolRegistry,
    params: CompletionParams,
    max_tool_call_depth: usize,
}

impl Agent {
    /// Create a new agent over a model binding and its completion backend.
    /// The registry is read-only from here on.
    pub fn new(model: ChatModel, completion: Box<dyn CompletionBackend>, tools: ToolRegistry) -> Self {
        Agent {
            model,
            completion,
            system_prompt: None,
            tools,
            params: CompletionParams::default(),
            max_tool_call_depth: DEFAULT_MAX_TOOL_CALL_DEPTH,
        }
    }

    /// Customize the behavior of the agent with a system prompt
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Override the generation parameters sent to the endpoint
    pub fn with_params(mut self, params: CompletionParams) -> Self {
        self.params = params;
        self
    }

    /// Bound the number of tool call rounds within one reply
    pub fn with_max_tool_call_depth(mut self, depth: usize) -> Self {
        self.max_tool_call_depth = depth;
        self
    }

    pub fn model(&self) -> &ChatModel {
        &self.model
    }

    /// Information about the model powering this agent
    pub fn model_info(&self) -> ModelInfo {
        self.model.info()
    }

    fn validate(messages: &[Message]) -> AgentResult<()> {
        let last = messages.last().ok_or_else(|| {
            AgentError::InvalidConversationState("no previous message to respond to".to_string())
        })?;
        if !matches!(last.role, Role::User | Role::Tool) {
            return Err(AgentError::InvalidConversationState(
                "last message is not from the user or a tool response".to_string(),
            ));
        }
        Ok(())
    }

    /// Craft the assistant message recording the calls the model made,
    /// minting correlation ids where the format uses them
    fn tool_calls_message(&self, calls: Vec<ToolCallFunction>) -> Message {
        Message::tool_calls(
            calls
                .into_iter()
                .map(|function| {
                    MessageToolCall::function_call(self.model.format().next_call_id(), function)
                })
                .collect(),
        )
    }

    async fn dispatch_tool_call(&self, call: &MessageToolCall) -> AgentResult<String> {
        let tool = self
            .tools
            .get(&call.function.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.function.name.clone()))?;
        tool.call(call.function.arguments.clone()).await
    }

    /// Run all calls of one turn concurrently and wait for every completion.
    /// A failed call does not abort the turn: the error text becomes that
    /// call's response so the model can react to it. Responses come back in
    /// call order regardless of completion order.
    async fn execute_tool_calls(&self, calls: &[MessageToolCall]) -> Vec<Message> {
        let futures: Vec<_> = calls.iter().map(|call| self.dispatch_tool_call(call)).collect();
        let outputs = join_all(futures).await;

        calls
            .iter()
            .zip(outputs)
            .map(|(call, output)| {
                let content = match output {
                    Ok(content) => content,
                    Err(e) => {
                        warn!(tool = %call.function.name, error = %e, "tool call failed");
                        format!("Error: {}", e)
                    }
                };
                Message::tool_response(call.function.name.clone(), call.id.clone(), content)
            })
            .collect()
    }

    /// Generate an answer based on a conversation.
    ///
    /// Creates a stream that yields each message as it is produced. With
    /// `only_final_answer` the thought process (tool call requests and their
    /// responses) is withheld and only the terminal assistant message is
    /// yielded. The caller's message list is never touched; the loop extends
    /// a working copy.
    ///
    /// Conversation-state validation happens here, before any network call.
    /// If the depth limit is exhausted without a tool-free response the
    /// stream ends with `ToolCallDepthExceeded`.
    pub async fn reply(
        &self,
        messages: &[Message],
        only_final_answer: bool,
    ) -> AgentResult<BoxStream<'_, AgentResult<Message>>> {
        Self::validate(messages)?;

        let mut messages = messages.to_vec();
        let tools = self.tools.specs();

        Ok(Box::pin(async_stream::try_stream! {
            for round in 0..self.max_tool_call_depth {
                let prompt =
                    self.model
                        .render_prompt(&messages, &tools, self.system_prompt.as_deref())?;
                let response = self.completion.complete(&prompt, &self.params).await?;

                let calls = self.model.format().extract_tool_calls(&response)?;
                if calls.is_empty() {
                    yield Message::assistant(response);
                    return;
                }

                tracing::debug!(round, count = calls.len(), "executing tool calls");
                let calls_message = self.tool_calls_message(calls);
                if !only_final_answer {
                    yield calls_message.clone();
                }

                let responses = self.execute_tool_calls(calls_message.calls()).await;
                messages.push(calls_message);
                if !only_final_answer {
                    for response in &responses {
                        yield response.clone();
                    }
                }
                // Next round sees the results and can call further tools or answer
                messages.extend(responses);
            }

            Err(AgentError::ToolCallDepthExceeded(self.max_tool_call_depth))?;
        }))
    }
}
