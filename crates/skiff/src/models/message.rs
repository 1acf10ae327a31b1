use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A function call demanded by the model: the registered name and a mapping
/// of argument name to value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl ToolCallFunction {
    pub fn new<S: Into<String>>(name: S, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// One entry of an assistant message's tool-call list. The id is absent for
/// formats that do not correlate responses by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageToolCall {
    #[serde(rename = "type")]
    pub call_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub function: ToolCallFunction,
}

impl MessageToolCall {
    pub fn function_call(id: Option<String>, function: ToolCallFunction) -> Self {
        Self {
            call_type: "function".to_string(),
            id,
            function,
        }
    }
}

/// A message to or from an LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<MessageToolCall>>,
}

impl Message {
    fn with_content(role: Role, content: impl Into<String>) -> Self {
        Message {
            role,
            content: Some(content.into()),
            name: None,
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_content(Role::System, content)
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_content(Role::User, content)
    }

    /// Create a new assistant message with plain text content
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_content(Role::Assistant, content)
    }

    /// Create an assistant message carrying only the list of calls made
    pub fn tool_calls(calls: Vec<MessageToolCall>) -> Self {
        Message {
            role: Role::Assistant,
            content: None,
            name: None,
            tool_call_id: None,
            tool_calls: Some(calls),
        }
    }

    /// Create a tool message answering the call with the given name and id
    pub fn tool_response(
        name: impl Into<String>,
        tool_call_id: Option<String>,
        content: impl Into<String>,
    ) -> Self {
        Message {
            role: Role::Tool,
            content: Some(content.into()),
            name: Some(name.into()),
            tool_call_id,
            tool_calls: None,
        }
    }

    /// The tool-call list of an assistant tool-call message, empty otherwise
    pub fn calls(&self) -> &[MessageToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_value(Role::Tool).unwrap(), json!("tool"));
        assert_eq!(
            serde_json::from_value::<Role>(json!("assistant")).unwrap(),
            Role::Assistant
        );
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let message = Message::user("hello");
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value, json!({"role": "user", "content": "hello"}));
    }

    #[test]
    fn test_tool_call_message_has_no_content() {
        let call = MessageToolCall::function_call(
            Some("abc".to_string()),
            ToolCallFunction::new("get_time", args(&[("timezone", json!("UTC"))])),
        );
        let message = Message::tool_calls(vec![call]);
        assert_eq!(message.role, Role::Assistant);
        assert!(message.content.is_none());
        assert_eq!(message.calls().len(), 1);
        assert_eq!(message.calls()[0].function.name, "get_time");
    }

    #[test]
    fn test_tool_response_carries_correlation_fields() {
        let message = Message::tool_response("get_time", Some("abc".to_string()), "12:00");
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "tool",
                "content": "12:00",
                "name": "get_time",
                "tool_call_id": "abc",
            })
        );
    }

    #[test]
    fn test_message_roundtrip() {
        let message = Message::tool_calls(vec![MessageToolCall::function_call(
            None,
            ToolCallFunction::new("ping", Map::new()),
        )]);
        let text = serde_json::to_string(&message).unwrap();
        let parsed: Message = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, message);
    }
}
