use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::{AgentConfig, RunContext};
use crate::errors::{RunError, RunResult};
use crate::execution::execute;
use crate::generation::generate;
use crate::models::conversation::Conversation;
use crate::models::message::Message;
use crate::prompt_template::{load_bundled_prompt, load_prompt_file};
use crate::providers::base::Provider;
use crate::registry::ToolRegistry;
use crate::sink::StreamSink;

/// The node a run moves to next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Generate,
    ExecuteTools,
    Terminate,
}

/// Decide the next state from the last message appended to the history
pub fn route(last: &Message) -> State {
    match last {
        Message::System { .. } | Message::User { .. } => State::Generate,
        Message::ToolResult { .. } => State::Generate,
        Message::Assistant { tool_calls, .. } if !tool_calls.is_empty() => State::ExecuteTools,
        Message::Assistant { .. } => State::Terminate,
    }
}

/// Agent alternates between streaming a model turn and running the tools it asks for,
/// until the model answers without requesting any tools
pub struct Agent {
    provider: Arc<dyn Provider>,
    registry: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(provider: Arc<dyn Provider>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            registry,
            config: AgentConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    fn system_instruction(&self, context: &RunContext) -> RunResult<String> {
        if let Some(instruction) = &context.system_instruction {
            return Ok(instruction.clone());
        }
        let prompt_context = json!({
            "tools": self.registry.tools(),
            "schema": context.schema,
        });
        let rendered = match &self.config.system_prompt_path {
            Some(path) => load_prompt_file(path, &prompt_context),
            None => load_bundled_prompt("system.md", &prompt_context),
        };
        rendered.map_err(|e| RunError::Internal(format!("Failed to render system prompt: {}", e)))
    }

    /// Answer a question, streaming partial text to the sink.
    ///
    /// The sink always receives exactly one terminal notification: completion when the
    /// model gives a final answer, cancellation when `cancel` fires, an error otherwise.
    pub async fn run(
        &self,
        context: RunContext,
        question: &str,
        sink: Option<&dyn StreamSink>,
        cancel: &CancellationToken,
    ) -> RunResult<Conversation> {
        let result = match self.system_instruction(&context) {
            Ok(system) => {
                let mut conversation = Conversation::new(system, question, context);
                self.drive(&mut conversation, sink, cancel)
                    .await
                    .map(|_| conversation)
            }
            Err(e) => Err(e),
        };

        if let Some(sink) = sink {
            match &result {
                Ok(_) => sink.on_complete().await,
                Err(RunError::Cancelled) => sink.on_cancelled().await,
                Err(e) => sink.on_error(&e.to_string()).await,
            }
        }

        match &result {
            Ok(conversation) => {
                tracing::info!(messages = conversation.len(), "run completed")
            }
            Err(RunError::Cancelled) => tracing::info!("run cancelled"),
            Err(e) => tracing::error!("run failed: {}", e),
        }
        result
    }

    async fn drive(
        &self,
        conversation: &mut Conversation,
        sink: Option<&dyn StreamSink>,
        cancel: &CancellationToken,
    ) -> RunResult<()> {
        let tools = self.registry.tools();
        let mut steps = 0;

        loop {
            let last = conversation
                .last()
                .ok_or_else(|| RunError::Internal("conversation has no messages".to_string()))?;
            let state = route(last);
            tracing::debug!(?state, steps, "routing");

            match state {
                State::Terminate => return Ok(()),
                _ if steps >= self.config.max_steps => {
                    return Err(RunError::StepLimitExceeded(self.config.max_steps));
                }
                State::Generate => {
                    let message = generate(
                        self.provider.as_ref(),
                        conversation.messages(),
                        &tools,
                        sink,
                        cancel,
                    )
                    .await?;
                    conversation.push_assistant(message)?;
                }
                State::ExecuteTools => {
                    let requests = last.tool_requests().to_vec();
                    let results = execute(
                        &self.registry,
                        &requests,
                        conversation.context(),
                        self.config.tool_call_policy,
                        cancel,
                    )
                    .await?;
                    conversation.push_tool_results(results)?;
                }
            }
            steps += 1;
        }
    }
}
