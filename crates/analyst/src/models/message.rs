use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::role::Role;
use super::tool::ToolCall;
use crate::errors::AgentResult;

/// A tool call as recorded on an assistant message. Calls whose arguments could not
/// be assembled keep their id so the failure can still be answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub id: String,
    pub tool_call: AgentResult<ToolCall>,
}

impl ToolRequest {
    pub fn new<S: Into<String>>(id: S, tool_call: AgentResult<ToolCall>) -> Self {
        Self {
            id: id.into(),
            tool_call,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
/// A turn in the conversation
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
        tool_calls: Vec<ToolRequest>,
    },
    ToolResult {
        tool_call_id: String,
        result: AgentResult<Value>,
    },
}

impl Message {
    pub fn system<S: Into<String>>(content: S) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user<S: Into<String>>(content: S) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_result<S: Into<String>>(tool_call_id: S, result: AgentResult<Value>) -> Self {
        Message::ToolResult {
            tool_call_id: tool_call_id.into(),
            result,
        }
    }

    /// Add a tool request to an assistant message. Other messages are returned unchanged.
    pub fn with_tool_request<S: Into<String>>(
        mut self,
        id: S,
        tool_call: AgentResult<ToolCall>,
    ) -> Self {
        match &mut self {
            Message::Assistant { tool_calls, .. } => {
                tool_calls.push(ToolRequest::new(id, tool_call));
            }
            other => {
                tracing::warn!(
                    role = ?other.role(),
                    "ignoring tool request on a non-assistant message"
                );
            }
        }
        self
    }

    pub fn role(&self) -> Role {
        match self {
            Message::System { .. } => Role::System,
            Message::User { .. } => Role::User,
            Message::Assistant { .. } => Role::Assistant,
            Message::ToolResult { .. } => Role::Tool,
        }
    }

    /// The text of the message as the model should see it. Tool results are
    /// rendered from their structured value or their error.
    pub fn text(&self) -> String {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Assistant { content, .. } => content.clone(),
            Message::ToolResult { result, .. } => match result {
                Ok(Value::String(text)) => text.clone(),
                Ok(value) => value.to_string(),
                Err(e) => format!("The tool call returned the following error:\n{}", e),
            },
        }
    }

    pub fn tool_requests(&self) -> &[ToolRequest] {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    pub fn has_tool_requests(&self) -> bool {
        !self.tool_requests().is_empty()
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Message::ToolResult { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AgentError;
    use serde_json::json;

    #[test]
    fn test_tool_result_text_renders_values() {
        let text = Message::tool_result("1", Ok(json!("plain"))).text();
        assert_eq!(text, "plain");

        let text = Message::tool_result("1", Ok(json!({"rows": 3}))).text();
        assert_eq!(text, r#"{"rows":3}"#);

        let text = Message::tool_result("1", Err(AgentError::ToolNotFound("nope".into()))).text();
        assert!(text.starts_with("The tool call returned the following error:"));
        assert!(text.contains("Tool not found: nope"));
    }

    #[test]
    fn test_tool_requests_only_on_assistant() {
        let message = Message::assistant("thinking")
            .with_tool_request("a", Ok(ToolCall::new("run_sql", json!({}))))
            .with_tool_request("b", Ok(ToolCall::new("analyse_data", json!({}))));

        assert_eq!(message.role(), Role::Assistant);
        assert_eq!(message.tool_requests().len(), 2);
        assert_eq!(message.tool_requests()[1].id, "b");
        assert!(Message::user("hi").tool_requests().is_empty());
        assert!(!Message::assistant("done").has_tool_requests());
    }

    #[test]
    fn test_with_tool_request_leaves_user_message_unchanged() {
        let message =
            Message::user("hi").with_tool_request("a", Ok(ToolCall::new("x", json!({}))));
        assert_eq!(message, Message::user("hi"));
        assert!(!message.has_tool_requests());
    }

    #[test]
    fn test_message_serializes_with_role_tag() {
        let value = serde_json::to_value(Message::system("be helpful")).unwrap();
        assert_eq!(value["role"], "system");
        assert_eq!(value["content"], "be helpful");

        let value = serde_json::to_value(Message::tool_result("call_9", Ok(json!(1)))).unwrap();
        assert_eq!(value["role"], "tool_result");
        assert_eq!(value["tool_call_id"], "call_9");
    }
}
