use tokenizers::tokenizer::Tokenizer;

use crate::errors::{AgentError, AgentResult};

enum Counter {
    Pretrained(Box<Tokenizer>),
    Approximate,
}

/// Counts prompt tokens with the tokenizer of the bound model.
pub struct TokenCounter {
    inner: Counter,
}

impl TokenCounter {
    /// Load the tokenizer published on the HuggingFace hub for this model id
    pub fn from_pretrained(model_id: &str) -> AgentResult<Self> {
        let tokenizer = Tokenizer::from_pretrained(model_id, None).map_err(|e| {
            AgentError::Tokenizer(format!("failed to load tokenizer for {}: {}", model_id, e))
        })?;
        Ok(TokenCounter {
            inner: Counter::Pretrained(Box::new(tokenizer)),
        })
    }

    /// Heuristic counter (~4 characters per token) for offline use
    pub fn approximate() -> Self {
        TokenCounter {
            inner: Counter::Approximate,
        }
    }

    pub fn count_tokens(&self, text: &str) -> AgentResult<usize> {
        match &self.inner {
            Counter::Pretrained(tokenizer) => {
                let encoding = tokenizer
                    .encode(text, false)
                    .map_err(|e| AgentError::Tokenizer(e.to_string()))?;
                Ok(encoding.len())
            }
            Counter::Approximate => Ok(text.chars().count().div_ceil(4)),
        }
    }
}
