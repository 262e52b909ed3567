use std::collections::HashSet;

use super::message::Message;
use crate::config::RunContext;
use crate::errors::{RunError, RunResult};

/// The history of a single run together with its read-only configuration.
///
/// History is append-only. Tool results can only be appended as a complete set
/// answering every request of the latest assistant turn.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
    context: RunContext,
}

impl Conversation {
    /// Seed a conversation with the system instruction and the user's question
    pub fn new<S: Into<String>, Q: Into<String>>(
        system_instruction: S,
        question: Q,
        context: RunContext,
    ) -> Self {
        Self {
            messages: vec![Message::system(system_instruction), Message::user(question)],
            context,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Text of the most recent assistant message
    pub fn final_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| matches!(m, Message::Assistant { .. }))
            .map(Message::text)
    }

    /// Ids of the latest assistant turn's tool requests that have no result yet
    pub fn pending_tool_calls(&self) -> Vec<&str> {
        let Some(turn) = self
            .messages
            .iter()
            .rposition(|m| matches!(m, Message::Assistant { .. }))
        else {
            return Vec::new();
        };

        let answered: HashSet<&str> = self.messages[turn + 1..]
            .iter()
            .filter_map(Message::tool_call_id)
            .collect();

        self.messages[turn]
            .tool_requests()
            .iter()
            .map(|r| r.id.as_str())
            .filter(|id| !answered.contains(id))
            .collect()
    }

    pub(crate) fn push_assistant(&mut self, message: Message) -> RunResult<()> {
        if !matches!(message, Message::Assistant { .. }) {
            return Err(RunError::Internal(format!(
                "expected an assistant message, got {:?}",
                message.role()
            )));
        }
        if !self.pending_tool_calls().is_empty() {
            return Err(RunError::Internal(
                "cannot start a new turn while tool calls are unanswered".to_string(),
            ));
        }
        self.messages.push(message);
        Ok(())
    }

    /// Append the results of one tool execution step. They must answer exactly the
    /// pending requests, each once.
    pub(crate) fn push_tool_results(&mut self, results: Vec<Message>) -> RunResult<()> {
        let pending: HashSet<String> = self
            .pending_tool_calls()
            .into_iter()
            .map(String::from)
            .collect();

        let mut answered = HashSet::new();
        for result in &results {
            let Some(id) = result.tool_call_id() else {
                return Err(RunError::Internal(format!(
                    "expected a tool result, got {:?}",
                    result.role()
                )));
            };
            if !pending.contains(id) || !answered.insert(id.to_string()) {
                return Err(RunError::Internal(format!(
                    "tool result {} does not answer a pending tool call",
                    id
                )));
            }
        }
        if answered.len() != pending.len() {
            return Err(RunError::Internal(format!(
                "expected {} tool results, got {}",
                pending.len(),
                answered.len()
            )));
        }

        self.messages.extend(results);
        Ok(())
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::ToolCall;
    use serde_json::json;

    fn with_two_calls() -> Conversation {
        let mut conversation = Conversation::new("sys", "question", RunContext::default());
        conversation
            .push_assistant(
                Message::assistant("")
                    .with_tool_request("a", Ok(ToolCall::new("run_sql", json!({}))))
                    .with_tool_request("b", Ok(ToolCall::new("run_sql", json!({})))),
            )
            .unwrap();
        conversation
    }

    #[test]
    fn test_seeded_with_system_and_user() {
        let conversation = Conversation::new("sys", "question", RunContext::default());
        assert_eq!(
            conversation.messages(),
            &[Message::system("sys"), Message::user("question")]
        );
        assert_eq!(conversation.final_text(), None);
    }

    #[test]
    fn test_partial_results_are_rejected() {
        let mut conversation = with_two_calls();
        let err = conversation
            .push_tool_results(vec![Message::tool_result("a", Ok(json!(1)))])
            .unwrap_err();
        assert!(err.to_string().contains("expected 2 tool results"));
        assert_eq!(conversation.pending_tool_calls(), vec!["a", "b"]);
    }

    #[test]
    fn test_unknown_or_duplicate_results_are_rejected() {
        let mut conversation = with_two_calls();
        assert!(conversation
            .push_tool_results(vec![
                Message::tool_result("a", Ok(json!(1))),
                Message::tool_result("zzz", Ok(json!(2))),
            ])
            .is_err());
        assert!(conversation
            .push_tool_results(vec![
                Message::tool_result("a", Ok(json!(1))),
                Message::tool_result("a", Ok(json!(2))),
            ])
            .is_err());
        assert_eq!(conversation.len(), 3);
    }

    #[test]
    fn test_complete_results_in_any_order_are_accepted() {
        let mut conversation = with_two_calls();
        conversation
            .push_tool_results(vec![
                Message::tool_result("b", Ok(json!(2))),
                Message::tool_result("a", Ok(json!(1))),
            ])
            .unwrap();
        assert!(conversation.pending_tool_calls().is_empty());
        assert_eq!(conversation.len(), 5);
    }

    #[test]
    fn test_new_turn_blocked_while_calls_pending() {
        let mut conversation = with_two_calls();
        let err = conversation
            .push_assistant(Message::assistant("too early"))
            .unwrap_err();
        assert!(err.to_string().contains("unanswered"));
    }

    #[test]
    fn test_final_text_is_last_assistant_message() {
        let mut conversation = with_two_calls();
        conversation
            .push_tool_results(vec![
                Message::tool_result("a", Ok(json!(1))),
                Message::tool_result("b", Ok(json!(2))),
            ])
            .unwrap();
        conversation
            .push_assistant(Message::assistant("All done."))
            .unwrap();
        assert_eq!(conversation.final_text().as_deref(), Some("All done."));
    }
}
