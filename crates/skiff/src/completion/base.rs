use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AgentResult;

/// Generation parameters forwarded to the completion endpoint alongside the
/// rendered prompt. Field names follow the llama.cpp server API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionParams {
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_predict: Option<i32>,
}

impl Default for CompletionParams {
    fn default() -> Self {
        CompletionParams {
            stream: false,
            temperature: None,
            top_p: None,
            n_predict: None,
        }
    }
}

/// One remote text-completion endpoint: rendered prompt in, generated text
/// out. Implementations must be safe to share across conversations.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str, params: &CompletionParams) -> AgentResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_serialize_minimally() {
        let params = CompletionParams::default();
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value, serde_json::json!({"stream": false}));
    }

    #[test]
    fn test_set_params_are_forwarded() {
        let params = CompletionParams {
            stream: true,
            temperature: Some(0.7),
            ..Default::default()
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["stream"], serde_json::json!(true));
        assert_eq!(value["temperature"], serde_json::json!(0.7));
    }
}
