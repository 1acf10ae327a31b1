use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};

use axum::extract::{Query, State};
use axum::http;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use skiff::models::message::Message;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct GenerateAnswerQuery {
    #[serde(default)]
    stream: bool,
    #[serde(default = "default_only_final_answer")]
    only_final_answer: bool,
}

fn default_only_final_answer() -> bool {
    true
}

/// Server-sent-event response streaming JSON-encoded messages
struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> Response {
        let body = axum::body::Body::from_stream(self);

        http::Response::builder()
            .header("Content-Type", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .header("Connection", "keep-alive")
            .body(body)
            .unwrap()
    }
}

fn format_event(message: &Message) -> Result<String, serde_json::Error> {
    Ok(format!("data: {}\n\n", serde_json::to_string(message)?))
}

fn format_error_event(error: &impl ToString) -> String {
    format!(
        "event: error\ndata: {}\n\n",
        json!({ "error": error.to_string() })
    )
}

/// Generate an answer based on an existing conversation.
/// The response messages can be streamed or sent in a single block.
async fn generate_answer(
    State(state): State<AppState>,
    Query(query): Query<GenerateAnswerQuery>,
    Json(messages): Json<Vec<Message>>,
) -> Result<Response, ApiError> {
    if query.stream {
        return Ok(stream_answer(state, messages, query.only_final_answer).into_response());
    }

    let mut stream = state.agent.reply(&messages, query.only_final_answer).await?;
    let mut response_messages: Vec<Message> = Vec::new();
    while let Some(message) = stream.try_next().await? {
        response_messages.push(message);
    }
    Ok(Json(response_messages).into_response())
}

/// Produce the answer in a background task and forward each message as one
/// SSE event. Failures after the headers are sent arrive as an `error` event.
fn stream_answer(state: AppState, messages: Vec<Message>, only_final_answer: bool) -> SseResponse {
    let (tx, rx) = mpsc::channel(100);

    tokio::spawn(async move {
        let agent = state.agent;
        let mut stream = match agent.reply(&messages, only_final_answer).await {
            Ok(stream) => stream,
            Err(e) => {
                let _ = tx.send(format_error_event(&e)).await;
                return;
            }
        };

        while let Some(result) = stream.next().await {
            let event = match result {
                Ok(message) => match format_event(&message) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to encode message");
                        break;
                    }
                },
                Err(e) => {
                    tracing::error!(error = %e, "error generating answer");
                    let _ = tx.send(format_error_event(&e)).await;
                    break;
                }
            };
            if tx.send(event).await.is_err() {
                // Client went away
                break;
            }
        }
    });

    SseResponse::new(ReceiverStream::new(rx))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/generate-answer", post(generate_answer))
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use skiff::agent::Agent;
    use skiff::completion::base::{CompletionBackend, CompletionParams};
    use skiff::errors::AgentResult;
    use skiff::model::{ChatModel, FormatKind, ModelConfig};
    use skiff::models::message::Role;
    use skiff::models::tool::{RegisteredTool, Tool, ToolRegistry};
    use skiff::token_counter::TokenCounter;
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Plays back canned completions, like a deployed model would
    struct ScriptedCompletion {
        responses: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl CompletionBackend for ScriptedCompletion {
        async fn complete(&self, _prompt: &str, _params: &CompletionParams) -> AgentResult<String> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(String::new())
            } else {
                Ok(responses.remove(0))
            }
        }
    }

    pub(crate) fn test_state(responses: Vec<&str>) -> AppState {
        let model = ChatModel::new(
            &ModelConfig {
                model_id: "test/model",
                endpoint: "http://localhost:8080/completion",
                context_length: 10_000,
                supports_system_message: true,
                format: FormatKind::Hermes,
            },
            TokenCounter::approximate(),
        );
        let backend = ScriptedCompletion {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
        };

        let mut tools = ToolRegistry::new();
        tools
            .register(RegisteredTool::new(
                Tool::new(
                    "get_current_temperature",
                    "Get the current temperature at a location.",
                    json!({
                        "type": "object",
                        "properties": {"location": {"type": "string"}},
                        "required": ["location"]
                    }),
                ),
                |_| async move { Ok("22.0".to_string()) },
            ))
            .unwrap();

        AppState::new(
            Agent::new(model, Box::new(backend), tools)
                .with_system_prompt("You are a helpful assistant"),
        )
    }

    fn post_request(uri: &str, body: Value) -> Request<axum::body::Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_batch_answer() {
        let app = routes(test_state(vec!["Hello there"]));
        let response = app
            .oneshot(post_request(
                "/generate-answer",
                json!([{"role": "user", "content": "Hi"}]),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let messages: Vec<Message> = serde_json::from_slice(&body).unwrap();
        assert_eq!(messages, vec![Message::assistant("Hello there")]);
    }

    #[tokio::test]
    async fn test_invalid_conversation_is_bad_request() {
        let app = routes(test_state(vec!["unused"]));
        let response = app
            .oneshot(post_request("/generate-answer", json!([])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error: Value = serde_json::from_slice(&body).unwrap();
        assert!(error["error"].as_str().unwrap().contains("previous message"));
    }

    #[tokio::test]
    async fn test_batch_answer_with_thought_process() {
        let tool_call = concat!(
            "<tool_call>\n",
            "{\"name\": \"get_current_temperature\", \"arguments\": {\"location\": \"Paris, France\"}}\n",
            "</tool_call>",
        );
        let app = routes(test_state(vec![tool_call, "It's 22°C in Paris."]));
        let response = app
            .oneshot(post_request(
                "/generate-answer?only_final_answer=false",
                json!([{"role": "user", "content": "What's the temperature in Paris?"}]),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let messages: Vec<Message> = serde_json::from_slice(&body).unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].calls().len(), 1);
        assert_eq!(messages[1].role, Role::Tool);
        assert_eq!(messages[2], Message::assistant("It's 22°C in Paris."));
    }

    #[tokio::test]
    async fn test_streamed_answer() {
        let app = routes(test_state(vec!["Hello there"]));
        let response = app
            .oneshot(post_request(
                "/generate-answer?stream=true",
                json!([{"role": "user", "content": "Hi"}]),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/event-stream"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        let payload = text.strip_prefix("data: ").unwrap();
        let message: Message = serde_json::from_str(payload.trim()).unwrap();
        assert_eq!(message, Message::assistant("Hello there"));
    }

    #[tokio::test]
    async fn test_streamed_invalid_conversation_sends_error_event() {
        let app = routes(test_state(vec!["unused"]));
        let response = app
            .oneshot(post_request("/generate-answer?stream=true", json!([])))
            .await
            .unwrap();

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.starts_with("event: error\n"));
    }
}
