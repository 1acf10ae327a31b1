use nanoid::nanoid;
use serde_json::json;

use super::base::ChatFormat;
use crate::errors::{AgentError, AgentResult};
use crate::models::message::{Message, Role, ToolCallFunction};
use crate::models::tool::Tool;

const CALL_ID_LENGTH: usize = 9;
const CALL_ID_ALPHABET: [char; 62] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B',
    'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U',
    'V', 'W', 'X', 'Y', 'Z',
];

const TOOL_CALLS_MARKER: &str = "[TOOL_CALLS]";

/// Mistral instruct rendering with `[TOOL_CALLS]` payloads. The endpoint
/// requires 9-character alphanumeric call ids to correlate responses.
#[derive(Default)]
pub struct MistralFormat;

impl MistralFormat {
    pub fn new() -> Self {
        MistralFormat
    }
}

impl ChatFormat for MistralFormat {
    fn render(&self, messages: &[Message], tools: &[Tool]) -> AgentResult<String> {
        let mut prompt = String::from("<s>");

        // The template has no system role; the binding never inserts one.
        let history: Vec<&Message> = messages.iter().filter(|m| m.role != Role::System).collect();
        let last_user = history.iter().rposition(|m| m.role == Role::User);

        for (i, message) in history.iter().enumerate() {
            match message.role {
                Role::User => {
                    // The tool catalog is advertised right before the last user turn
                    if Some(i) == last_user && !tools.is_empty() {
                        let catalog: Vec<_> = tools
                            .iter()
                            .map(|tool| json!({"type": "function", "function": tool}))
                            .collect();
                        prompt.push_str("[AVAILABLE_TOOLS]");
                        prompt.push_str(
                            &serde_json::to_string(&catalog)
                                .map_err(|e| AgentError::ToolCallParse(e.to_string()))?,
                        );
                        prompt.push_str("[/AVAILABLE_TOOLS]");
                    }
                    prompt.push_str("[INST] ");
                    prompt.push_str(message.content.as_deref().unwrap_or(""));
                    prompt.push_str("[/INST]");
                }
                Role::Assistant => {
                    if message.calls().is_empty() {
                        prompt.push_str(message.content.as_deref().unwrap_or(""));
                        prompt.push_str("</s>");
                    } else {
                        let calls: Vec<_> = message
                            .calls()
                            .iter()
                            .map(|call| {
                                json!({
                                    "name": &call.function.name,
                                    "arguments": &call.function.arguments,
                                    "id": &call.id,
                                })
                            })
                            .collect();
                        prompt.push_str("[TOOL_CALLS]");
                        prompt.push_str(
                            &serde_json::to_string(&calls)
                                .map_err(|e| AgentError::ToolCallParse(e.to_string()))?,
                        );
                        prompt.push_str("</s>");
                    }
                }
                Role::Tool => {
                    let payload = json!({
                        "call_id": &message.tool_call_id,
                        "name": &message.name,
                        "content": &message.content,
                    });
                    prompt.push_str("[TOOL_RESULTS]");
                    prompt.push_str(&payload.to_string());
                    prompt.push_str("[/TOOL_RESULTS]");
                }
                Role::System => unreachable!("system messages are filtered above"),
            }
        }

        Ok(prompt)
    }

    fn extract_tool_calls(&self, response: &str) -> AgentResult<Vec<ToolCallFunction>> {
        let mut calls = Vec::new();
        for (at, _) in response.match_indices(TOOL_CALLS_MARKER) {
            let payload = response[at + TOOL_CALLS_MARKER.len()..].trim_start();
            // A regex cannot delimit the array (argument values may nest
            // brackets); take exactly one JSON value off the front instead.
            let mut stream =
                serde_json::Deserializer::from_str(payload).into_iter::<Vec<ToolCallFunction>>();
            match stream.next() {
                Some(Ok(parsed)) => calls.extend(parsed),
                Some(Err(e)) => {
                    return Err(AgentError::ToolCallParse(format!(
                        "{} after {}",
                        e, TOOL_CALLS_MARKER
                    )))
                }
                None => {
                    return Err(AgentError::ToolCallParse(format!(
                        "empty payload after {}",
                        TOOL_CALLS_MARKER
                    )))
                }
            }
        }
        Ok(calls)
    }

    fn next_call_id(&self) -> Option<String> {
        Some(nanoid!(CALL_ID_LENGTH, &CALL_ID_ALPHABET))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::MessageToolCall;
    use serde_json::{Map, Value};

    fn format() -> MistralFormat {
        MistralFormat::new()
    }

    fn ping_tool() -> Tool {
        Tool::new("ping", "Ping a host", json!({"type": "object", "properties": {}}))
    }

    fn host_arguments() -> Map<String, Value> {
        let mut arguments = Map::new();
        arguments.insert("host".to_string(), json!("example.com"));
        arguments
    }

    #[test]
    fn test_render_plain_conversation() {
        let messages = vec![Message::user("Hello")];
        let prompt = format().render(&messages, &[]).unwrap();
        assert_eq!(prompt, "<s>[INST] Hello[/INST]");
    }

    #[test]
    fn test_render_catalog_before_last_user_turn() {
        let messages = vec![
            Message::user("Hi"),
            Message::assistant("Hello!"),
            Message::user("Ping example.com"),
        ];
        let prompt = format().render(&messages, &[ping_tool()]).unwrap();

        let catalog_at = prompt.find("[AVAILABLE_TOOLS]").unwrap();
        let first_turn_at = prompt.find("[INST] Hi").unwrap();
        let last_turn_at = prompt.find("[INST] Ping example.com").unwrap();
        assert!(first_turn_at < catalog_at && catalog_at < last_turn_at);
    }

    #[test]
    fn test_render_skips_system_messages() {
        let messages = vec![Message::system("unused"), Message::user("Hello")];
        let prompt = format().render(&messages, &[]).unwrap();
        assert!(!prompt.contains("unused"));
    }

    #[test]
    fn test_extract_calls_with_ids_ignored() {
        let response = r#"[TOOL_CALLS][{"name": "ping", "arguments": {"host": "example.com"}, "id": "a1b2c3d4e"}]"#;
        let calls = format().extract_tool_calls(response).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "ping");
        assert_eq!(calls[0].arguments, host_arguments());
    }

    #[test]
    fn test_extract_handles_nested_brackets() {
        let response = r#"[TOOL_CALLS][{"name": "batch", "arguments": {"hosts": ["a", "b"]}}]"#;
        let calls = format().extract_tool_calls(response).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments["hosts"], json!(["a", "b"]));
    }

    #[test]
    fn test_extract_malformed_payload_fails() {
        let response = "[TOOL_CALLS][{\"name\": }]";
        let err = format().extract_tool_calls(response).unwrap_err();
        assert!(matches!(err, AgentError::ToolCallParse(_)));
    }

    #[test]
    fn test_rendered_call_roundtrips_through_extraction() {
        let original = ToolCallFunction::new("ping", host_arguments());
        let rendered = format!(
            "[TOOL_CALLS]{}",
            serde_json::to_string(&vec![original.clone()]).unwrap()
        );
        let calls = format().extract_tool_calls(&rendered).unwrap();
        assert_eq!(calls, vec![original]);
    }

    #[test]
    fn test_call_ids_are_nine_alphanumeric_chars() {
        let format = format();
        let id = format.next_call_id().unwrap();
        assert_eq!(id.len(), 9);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(format.next_call_id().unwrap(), id);
    }

    #[test]
    fn test_render_tool_exchange() {
        let call = MessageToolCall::function_call(
            Some("a1b2c3d4e".to_string()),
            ToolCallFunction::new("ping", host_arguments()),
        );
        let messages = vec![
            Message::user("Ping example.com"),
            Message::tool_calls(vec![call]),
            Message::tool_response("ping", Some("a1b2c3d4e".to_string()), "pong"),
        ];
        let prompt = format().render(&messages, &[ping_tool()]).unwrap();

        assert!(prompt.contains("[TOOL_CALLS]"));
        assert!(prompt.contains("[TOOL_RESULTS]"));
        assert!(prompt.contains("a1b2c3d4e"));
    }
}
