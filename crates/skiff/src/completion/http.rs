use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::base::{CompletionBackend, CompletionParams};
use crate::errors::{AgentError, AgentResult};

#[derive(Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    #[serde(flatten)]
    params: &'a CompletionParams,
}

#[derive(Deserialize)]
struct CompletionResponse {
    content: String,
}

#[derive(Deserialize)]
struct CompletionChunk {
    content: String,
    #[serde(default)]
    stop: bool,
}

/// Client for a llama.cpp-style completion endpoint.
///
/// No automatic retry is performed on failures; callers see the first
/// error. Retry/backoff is a known gap.
pub struct HttpCompletionClient {
    client: Client,
    endpoint: String,
}

impl HttpCompletionClient {
    pub fn new(endpoint: impl Into<String>) -> AgentResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()?;

        Ok(HttpCompletionClient {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Stream partial content chunks for one completion. The sequence is
    /// finite and cannot be restarted; callers that need tool-call detection
    /// must use `complete` instead, since calls can only be extracted from a
    /// fully assembled turn.
    pub fn complete_stream(
        &self,
        prompt: String,
        params: &CompletionParams,
    ) -> BoxStream<'_, AgentResult<String>> {
        let params = CompletionParams {
            stream: true,
            ..params.clone()
        };

        Box::pin(async_stream::try_stream! {
            let response = self
                .client
                .post(&self.endpoint)
                .json(&CompletionRequest { prompt: &prompt, params: &params })
                .send()
                .await?;

            let status = response.status();
            if status != StatusCode::OK {
                Err(AgentError::ModelUnavailable { status: status.as_u16() })?;
            }

            let mut body = response.bytes_stream();
            let mut buffer = String::new();
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // SSE events are separated by a blank line
                while let Some(end) = buffer.find("\n\n") {
                    let event: String = buffer.drain(..end + 2).collect();
                    for line in event.lines() {
                        if let Some(payload) = line.strip_prefix("data: ") {
                            let parsed: CompletionChunk = serde_json::from_str(payload)
                                .map_err(|e| AgentError::MalformedCompletion(e.to_string()))?;
                            yield parsed.content;
                            if parsed.stop {
                                return;
                            }
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionClient {
    async fn complete(&self, prompt: &str, params: &CompletionParams) -> AgentResult<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&CompletionRequest { prompt, params })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body: CompletionResponse = response
                    .json()
                    .await
                    .map_err(|e| AgentError::MalformedCompletion(e.to_string()))?;
                Ok(body.content)
            }
            status => Err(AgentError::ModelUnavailable {
                status: status.as_u16(),
            }),
        }
    }
}
