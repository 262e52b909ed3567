use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors scoped to a single tool call. These never end a run: they are folded
/// back into the conversation as tool-result messages so the model can react.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Could not parse arguments for tool call {id} ({name}): {message}. Raw arguments: {raw}")]
    ArgumentsParse {
        id: String,
        name: String,
        raw: String,
        message: String,
    },

    #[error("Skipped: {0}")]
    Skipped(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Errors that end a run. Cancellation is listed here because it stops the run,
/// not because it is a failure.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Upstream stream error: {0}")]
    Upstream(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Step limit of {0} exceeded without reaching a final answer")]
    StepLimitExceeded(usize),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RunError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunError::Cancelled)
    }
}

pub type RunResult<T> = Result<T, RunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments_parse_display_includes_raw() {
        let err = AgentError::ArgumentsParse {
            id: "call_1".to_string(),
            name: "run_sql".to_string(),
            raw: "{\"query\": \"SEL".to_string(),
            message: "EOF while parsing a string".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("call_1"));
        assert!(text.contains("run_sql"));
        assert!(text.contains("{\"query\": \"SEL"));
    }

    #[test]
    fn test_agent_error_round_trips_through_json() {
        let err = AgentError::ToolNotFound("missing".to_string());
        let json = serde_json::to_string(&err).unwrap();
        let back: AgentError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }

    #[test]
    fn test_run_error_is_cancelled() {
        assert!(RunError::Cancelled.is_cancelled());
        assert!(!RunError::Upstream("boom".to_string()).is_cancelled());
    }
}
