use analyst::agent::Agent;
use analyst::http_tool::HttpTool;
use analyst::providers::openai::OpenAiProvider;
use analyst::registry::ToolRegistry;
use std::sync::Arc;

use crate::configuration::Settings;
use crate::error::ConfigError;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub sink_buffer: usize,
}

impl AppState {
    pub fn new(agent: Agent, sink_buffer: usize) -> Self {
        Self {
            agent: Arc::new(agent),
            sink_buffer,
        }
    }

    /// Build the agent described by the settings: an OpenAI provider and one HTTP
    /// tool per configured entry
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let mut registry = ToolRegistry::new();
        for entry in &settings.tools {
            let tool = HttpTool::new(entry.tool(), &entry.url).map_err(|e| {
                ConfigError::InvalidTool {
                    name: entry.name.clone(),
                    message: e.to_string(),
                }
            })?;
            registry
                .register(Arc::new(tool))
                .map_err(|e| ConfigError::InvalidTool {
                    name: entry.name.clone(),
                    message: e.to_string(),
                })?;
        }
        tracing::info!(tools = registry.len(), "registered tools");

        let provider = OpenAiProvider::new(settings.provider.into_config())?;
        let agent = Agent::new(Arc::new(provider), Arc::new(registry))
            .with_config(settings.agent.agent_config());

        Ok(Self::new(agent, settings.agent.sink_buffer))
    }
}
