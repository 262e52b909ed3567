use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};

use crate::errors::AgentError;
use crate::models::fragment::{StreamFragment, ToolCallFragment};
use crate::models::message::Message;
use crate::models::tool::Tool;

lazy_static! {
    static ref INVALID_NAME_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
    static ref VALID_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Convert internal Message format to OpenAI's API message specification
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|message| match message {
            Message::System { content } => json!({
                "role": "system",
                "content": content,
            }),
            Message::User { content } => json!({
                "role": "user",
                "content": content,
            }),
            Message::Assistant {
                content,
                tool_calls,
            } => {
                let mut converted = json!({ "role": "assistant" });
                converted["content"] = if content.is_empty() {
                    Value::Null
                } else {
                    json!(content)
                };

                if !tool_calls.is_empty() {
                    let calls: Vec<Value> = tool_calls
                        .iter()
                        .map(|request| {
                            // a malformed call is replayed with empty arguments; the raw
                            // text is carried by the matching tool result instead
                            let (name, arguments) = match &request.tool_call {
                                Ok(call) => (call.name.clone(), call.arguments.to_string()),
                                Err(AgentError::ArgumentsParse { name, .. }) => {
                                    (name.clone(), "{}".to_string())
                                }
                                Err(_) => ("unknown_tool".to_string(), "{}".to_string()),
                            };
                            json!({
                                "id": request.id,
                                "type": "function",
                                "function": {
                                    "name": sanitize_function_name(&name),
                                    "arguments": arguments,
                                }
                            })
                        })
                        .collect();
                    converted["tool_calls"] = json!(calls);
                }
                converted
            }
            Message::ToolResult { tool_call_id, .. } => json!({
                "role": "tool",
                "content": message.text(),
                "tool_call_id": tool_call_id,
            }),
        })
        .collect()
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": sanitize_function_name(&tool.name),
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }));
    }

    Ok(result)
}

/// Convert one streamed chat completion chunk into a fragment.
///
/// Returns `Ok(None)` for chunks that carry nothing for the orchestrator, such as
/// usage-only chunks or the leading role announcement.
pub fn openai_chunk_to_fragment(chunk: &Value) -> Result<Option<StreamFragment>> {
    if let Some(error) = chunk.get("error") {
        if let Some(err) = check_openai_context_length_error(error) {
            return Err(err.into());
        }
        return Err(anyhow!("OpenAI API error: {}", error));
    }

    let Some(delta) = chunk["choices"].get(0).and_then(|choice| choice.get("delta")) else {
        return Ok(None);
    };

    let mut fragment = StreamFragment {
        text: delta
            .get("content")
            .and_then(Value::as_str)
            .map(String::from),
        tool_calls: Vec::new(),
    };

    if let Some(tool_calls) = delta.get("tool_calls").and_then(Value::as_array) {
        for tool_call in tool_calls {
            let function = &tool_call["function"];
            fragment.tool_calls.push(ToolCallFragment {
                index: tool_call
                    .get("index")
                    .and_then(Value::as_u64)
                    .map(|i| i as u32),
                id: tool_call.get("id").and_then(Value::as_str).map(String::from),
                name: function.get("name").and_then(Value::as_str).map(String::from),
                arguments_chunk: function
                    .get("arguments")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                kind: tool_call.get("type").and_then(Value::as_str).map(String::from),
            });
        }
    }

    if fragment.is_empty() {
        Ok(None)
    } else {
        Ok(Some(fragment))
    }
}

pub fn sanitize_function_name(name: &str) -> String {
    INVALID_NAME_CHARS.replace_all(name, "_").to_string()
}

pub fn is_valid_function_name(name: &str) -> bool {
    VALID_NAME.is_match(name)
}

#[derive(Debug, thiserror::Error)]
#[error("Context length exceeded. Message: {0}")]
pub struct ContextLengthExceededError(String);

pub fn check_openai_context_length_error(error: &Value) -> Option<ContextLengthExceededError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ContextLengthExceededError(message))
    } else {
        None
    }
}
