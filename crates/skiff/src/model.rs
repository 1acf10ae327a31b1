use serde::{Deserialize, Serialize};

use crate::errors::{AgentError, AgentResult};
use crate::formats::base::ChatFormat;
use crate::formats::hermes::HermesFormat;
use crate::formats::mistral::MistralFormat;
use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::token_counter::TokenCounter;

/// Which chat template family a model binding uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    Hermes,
    Mistral,
}

impl FormatKind {
    fn build(self) -> Box<dyn ChatFormat> {
        match self {
            FormatKind::Hermes => Box::new(HermesFormat::new()),
            FormatKind::Mistral => Box::new(MistralFormat::new()),
        }
    }
}

/// Catalog entry tying a model id to its completion endpoint and limits
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model_id: &'static str,
    pub endpoint: &'static str,
    pub context_length: usize,
    pub supports_system_message: bool,
    pub format: FormatKind,
}

/// The models with deployed completion endpoints
pub const KNOWN_MODELS: &[ModelConfig] = &[
    ModelConfig {
        model_id: "NousResearch/Hermes-2-Pro-Llama-3-8B",
        endpoint:
            "https://curated.aleph.cloud/vm/84df52ac4466d121ef3bb409bb14f315de7be4ce600e8948d71df6485aa5bcc3/completion",
        context_length: 8192,
        supports_system_message: true,
        format: FormatKind::Hermes,
    },
    ModelConfig {
        model_id: "NousResearch/Hermes-3-Llama-3.1-8B",
        endpoint: "http://localhost:8080/completion",
        context_length: 16384,
        supports_system_message: true,
        format: FormatKind::Hermes,
    },
    ModelConfig {
        model_id: "mistralai/Mistral-Nemo-Instruct-2407",
        endpoint: "http://localhost:8080/completion",
        context_length: 16384,
        supports_system_message: false,
        format: FormatKind::Mistral,
    },
];

/// Model identity exposed on the agent API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub context_length: usize,
}

/// Immutable binding of a model id to its endpoint, context budget, chat
/// template and tokenizer. Built once at agent-setup time and read-only
/// afterwards, so it can be shared across concurrent conversations.
pub struct ChatModel {
    model_id: String,
    endpoint: String,
    context_length: usize,
    supports_system_message: bool,
    format: Box<dyn ChatFormat>,
    token_counter: TokenCounter,
}

impl std::fmt::Debug for ChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatModel")
            .field("model_id", &self.model_id)
            .field("endpoint", &self.endpoint)
            .field("context_length", &self.context_length)
            .field("supports_system_message", &self.supports_system_message)
            .finish_non_exhaustive()
    }
}

impl ChatModel {
    pub fn new(config: &ModelConfig, token_counter: TokenCounter) -> Self {
        ChatModel {
            model_id: config.model_id.to_string(),
            endpoint: config.endpoint.to_string(),
            context_length: config.context_length,
            supports_system_message: config.supports_system_message,
            format: config.format.build(),
            token_counter,
        }
    }

    /// Look up a model in the catalog and load its tokenizer from the hub
    pub fn from_catalog(model_id: &str) -> AgentResult<Self> {
        let config = KNOWN_MODELS
            .iter()
            .find(|m| m.model_id == model_id)
            .ok_or_else(|| AgentError::UnknownModel(model_id.to_string()))?;
        let token_counter = TokenCounter::from_pretrained(config.model_id)?;
        Ok(ChatModel::new(config, token_counter))
    }

    /// Override the completion endpoint, e.g. for a local deployment
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn context_length(&self) -> usize {
        self.context_length
    }

    pub fn format(&self) -> &dyn ChatFormat {
        &*self.format
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            id: self.model_id.clone(),
            context_length: self.context_length,
        }
    }

    /// Render the whole chat prompt, dropping the oldest non-system messages
    /// until the result fits the context length.
    pub fn render_prompt(
        &self,
        messages: &[Message],
        tools: &[Tool],
        system_prompt: Option<&str>,
    ) -> AgentResult<String> {
        let mut candidate: Vec<Message> = Vec::with_capacity(messages.len() + 1);
        let system_count = match system_prompt {
            Some(prompt) if self.supports_system_message => {
                candidate.push(Message::system(prompt));
                1
            }
            _ => 0,
        };
        candidate.extend_from_slice(messages);

        loop {
            let prompt = self.format.render(&candidate, tools)?;
            if self.token_counter.count_tokens(&prompt)? <= self.context_length {
                return Ok(prompt);
            }
            if candidate.len() <= system_count + 1 {
                return Err(AgentError::ContextOverflow {
                    context_length: self.context_length,
                });
            }
            tracing::debug!(
                history_len = candidate.len() - system_count,
                "prompt over context budget, dropping oldest message"
            );
            candidate.remove(system_count);
        }
    }
}
