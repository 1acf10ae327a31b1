use regex::Regex;
use serde::Serialize;
use serde_json::json;

use super::base::ChatFormat;
use crate::errors::{AgentError, AgentResult};
use crate::models::message::{Message, Role, ToolCallFunction};
use crate::models::tool::Tool;
use crate::prompt_template::load_prompt_file;

const SYSTEM_TEMPLATE: &str = "hermes_system.md";

#[derive(Serialize)]
struct SystemContext<'a> {
    system_prompt: Option<&'a str>,
    tools: &'a [Tool],
}

/// ChatML rendering with Hermes-style `<tool_call>` blocks. Calls carry no
/// correlation ids; responses line up with calls by order.
pub struct HermesFormat {
    tool_call_pattern: Regex,
}

impl Default for HermesFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl HermesFormat {
    pub fn new() -> Self {
        HermesFormat {
            // Payloads can span lines, hence the non-greedy dotall group
            tool_call_pattern: Regex::new(r"(?s)<tool_call>\s*(.*?)\s*</tool_call>")
                .expect("invalid tool call pattern"),
        }
    }

    fn render_turn(prompt: &mut String, role: &str, content: &str) {
        prompt.push_str("<|im_start|>");
        prompt.push_str(role);
        prompt.push('\n');
        prompt.push_str(content);
        prompt.push_str("<|im_end|>\n");
    }
}

impl ChatFormat for HermesFormat {
    fn render(&self, messages: &[Message], tools: &[Tool]) -> AgentResult<String> {
        let mut prompt = String::new();

        let system_prompt = messages
            .first()
            .filter(|m| m.role == Role::System)
            .and_then(|m| m.content.as_deref());
        if system_prompt.is_some() || !tools.is_empty() {
            let content = load_prompt_file(
                SYSTEM_TEMPLATE,
                &SystemContext {
                    system_prompt,
                    tools,
                },
            )?;
            Self::render_turn(&mut prompt, "system", &content);
        }

        for message in messages.iter().filter(|m| m.role != Role::System) {
            match message.role {
                Role::User => {
                    Self::render_turn(&mut prompt, "user", message.content.as_deref().unwrap_or(""))
                }
                Role::Assistant => {
                    if message.calls().is_empty() {
                        Self::render_turn(
                            &mut prompt,
                            "assistant",
                            message.content.as_deref().unwrap_or(""),
                        );
                    } else {
                        let mut content = String::new();
                        for call in message.calls() {
                            content.push_str("<tool_call>\n");
                            content.push_str(&serde_json::to_string(&call.function).map_err(
                                |e| AgentError::ToolCallParse(e.to_string()),
                            )?);
                            content.push_str("\n</tool_call>");
                        }
                        Self::render_turn(&mut prompt, "assistant", &content);
                    }
                }
                Role::Tool => {
                    let payload = json!({
                        "name": &message.name,
                        "content": &message.content,
                    });
                    let content = format!("<tool_response>\n{}\n</tool_response>", payload);
                    Self::render_turn(&mut prompt, "tool", &content);
                }
                Role::System => unreachable!("system messages are rendered above"),
            }
        }

        prompt.push_str("<|im_start|>assistant\n");
        Ok(prompt)
    }

    fn extract_tool_calls(&self, response: &str) -> AgentResult<Vec<ToolCallFunction>> {
        let mut calls = Vec::new();
        for capture in self.tool_call_pattern.captures_iter(response) {
            let payload = &capture[1];
            let call: ToolCallFunction = serde_json::from_str(payload).map_err(|e| {
                AgentError::ToolCallParse(format!("{} in payload {:?}", e, payload))
            })?;
            calls.push(call);
        }
        Ok(calls)
    }

    fn next_call_id(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::MessageToolCall;
    use serde_json::{Map, Value};

    fn format() -> HermesFormat {
        HermesFormat::new()
    }

    fn temperature_tool() -> Tool {
        Tool::new(
            "get_current_temperature",
            "Get the current temperature at a location.",
            json!({
                "type": "object",
                "properties": {
                    "location": {"type": "string"},
                    "unit": {"type": "string", "enum": ["celsius", "fahrenheit"]}
                },
                "required": ["location", "unit"]
            }),
        )
    }

    fn paris_arguments() -> Map<String, Value> {
        let mut arguments = Map::new();
        arguments.insert("location".to_string(), json!("Paris, France"));
        arguments
    }

    #[test]
    fn test_render_plain_conversation() {
        let messages = vec![
            Message::system("You are a helpful assistant"),
            Message::user("Hi"),
        ];
        let prompt = format().render(&messages, &[]).unwrap();

        assert!(prompt.starts_with("<|im_start|>system\nYou are a helpful assistant<|im_end|>\n"));
        assert!(prompt.contains("<|im_start|>user\nHi<|im_end|>\n"));
        assert!(prompt.ends_with("<|im_start|>assistant\n"));
        // No tool catalog without tools
        assert!(!prompt.contains("<tools>"));
    }

    #[test]
    fn test_render_embeds_tool_catalog() {
        let messages = vec![Message::user("What's the weather?")];
        let prompt = format().render(&messages, &[temperature_tool()]).unwrap();

        assert!(prompt.contains("<tools>"));
        assert!(prompt.contains("get_current_temperature"));
        // Tool catalog goes into a system turn even without a system prompt
        assert!(prompt.starts_with("<|im_start|>system\n"));
    }

    #[test]
    fn test_render_tool_exchange() {
        let call = MessageToolCall::function_call(
            None,
            ToolCallFunction::new("get_current_temperature", paris_arguments()),
        );
        let messages = vec![
            Message::user("What's the temperature in Paris?"),
            Message::tool_calls(vec![call]),
            Message::tool_response("get_current_temperature", None, "22.0"),
        ];
        let prompt = format().render(&messages, &[temperature_tool()]).unwrap();

        assert!(prompt.contains("<|im_start|>assistant\n<tool_call>\n"));
        assert!(prompt.contains("<|im_start|>tool\n<tool_response>\n"));
        assert!(prompt.contains("\"content\":\"22.0\""));
    }

    #[test]
    fn test_extract_no_calls() {
        let calls = format()
            .extract_tool_calls("It's 22°C in Paris.")
            .unwrap();
        assert!(calls.is_empty());
    }

    #[test]
    fn test_extract_preserves_order() {
        let response = concat!(
            "<tool_call>\n{\"name\": \"first\", \"arguments\": {}}\n</tool_call>\n",
            "<tool_call>\n{\"name\": \"second\", \"arguments\": {}}\n</tool_call>",
        );
        let calls = format().extract_tool_calls(response).unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "first");
        assert_eq!(calls[1].name, "second");
    }

    #[test]
    fn test_extract_malformed_payload_fails() {
        let response = "<tool_call>\n{\"name\": \"broken\"\n</tool_call>";
        let err = format().extract_tool_calls(response).unwrap_err();
        assert!(matches!(err, AgentError::ToolCallParse(_)));
    }

    #[test]
    fn test_rendered_call_roundtrips_through_extraction() {
        let original = ToolCallFunction::new("get_current_temperature", paris_arguments());
        let rendered = format!(
            "<tool_call>\n{}\n</tool_call>",
            serde_json::to_string(&original).unwrap()
        );
        let calls = format().extract_tool_calls(&rendered).unwrap();
        assert_eq!(calls, vec![original]);
    }

    #[test]
    fn test_no_call_ids() {
        assert_eq!(format().next_call_id(), None);
    }
}
