use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Invalid conversation state: {0}")]
    InvalidConversationState(String),

    #[error("Conversation does not fit in the context length ({context_length} tokens)")]
    ContextOverflow { context_length: usize },

    #[error("Model endpoint returned status {status}")]
    ModelUnavailable { status: u16 },

    #[error("Completion request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Malformed completion payload: {0}")]
    MalformedCompletion(String),

    #[error("Malformed tool call payload: {0}")]
    ToolCallParse(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("A tool named {0} is already registered")]
    DuplicateTool(String),

    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    #[error("No tool-free response after {0} tool call rounds")]
    ToolCallDepthExceeded(usize),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),
}

pub type AgentResult<T> = Result<T, AgentError>;
