use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Read-only configuration for a single run, handed to every tool invocation
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RunContext {
    pub organization_id: String,
    pub connection_id: String,
    pub auth_token: String,
    /// Description of the data schema the tools operate on
    pub schema: String,
    /// Overrides the default system instruction when set
    pub system_instruction: Option<String>,
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("organization_id", &self.organization_id)
            .field("connection_id", &self.connection_id)
            .field("auth_token", &"<redacted>")
            .field("schema", &format_args!("<{} bytes>", self.schema.len()))
            .field("system_instruction", &self.system_instruction.is_some())
            .finish()
    }
}

impl RunContext {
    pub fn new<O: Into<String>, C: Into<String>>(organization_id: O, connection_id: C) -> Self {
        Self {
            organization_id: organization_id.into(),
            connection_id: connection_id.into(),
            ..Default::default()
        }
    }

    pub fn with_auth_token<S: Into<String>>(mut self, token: S) -> Self {
        self.auth_token = token.into();
        self
    }

    pub fn with_schema<S: Into<String>>(mut self, schema: S) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn with_system_instruction<S: Into<String>>(mut self, instruction: S) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }
}

/// How the tool calls of one turn are dispatched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallPolicy {
    /// Dispatch every call of the turn at once and wait for all of them
    #[default]
    Concurrent,
    /// Run calls one at a time, in the order the model requested them
    Sequential,
}

pub const DEFAULT_MAX_STEPS: usize = 25;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Upper bound on generate and execute steps in a single run
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default)]
    pub tool_call_policy: ToolCallPolicy,
    /// Template file replacing the bundled system prompt
    #[serde(default)]
    pub system_prompt_path: Option<PathBuf>,
}

fn default_max_steps() -> usize {
    DEFAULT_MAX_STEPS
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            tool_call_policy: ToolCallPolicy::default(),
            system_prompt_path: None,
        }
    }
}
