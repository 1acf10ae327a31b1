use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::base::{CompletionBackend, CompletionParams};
use crate::errors::AgentResult;

/// A completion backend that plays back pre-configured responses for testing
/// and records how often it was called.
pub struct MockCompletion {
    responses: Arc<Mutex<Vec<String>>>,
    calls: Arc<AtomicUsize>,
}

impl MockCompletion {
    /// Create a new mock backend with a sequence of responses
    pub fn new(responses: Vec<&str>) -> Self {
        MockCompletion {
            responses: Arc::new(Mutex::new(
                responses.into_iter().map(String::from).collect(),
            )),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of completion requests made so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Handle onto the call counter that survives moving the mock into an agent
    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl CompletionBackend for MockCompletion {
    async fn complete(&self, _prompt: &str, _params: &CompletionParams) -> AgentResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            // Return an empty answer once the pre-configured responses run out
            Ok(String::new())
        } else {
            Ok(responses.remove(0))
        }
    }
}
