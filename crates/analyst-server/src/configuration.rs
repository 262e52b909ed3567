use crate::error::{to_env_var, ConfigError};
use analyst::config::{AgentConfig, ToolCallPolicy, DEFAULT_MAX_STEPS};
use analyst::models::tool::Tool;
use analyst::providers::configs::{OpenAiProviderConfig, OPENAI_HOST, OPENAI_MODEL};
use config::{Config, Environment, File};
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Environment variable naming the optional TOML settings file
pub const CONFIG_PATH_VAR: &str = "ANALYST_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "analyst.toml";

#[derive(Debug, Default, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let address = format!("{}:{}", self.host, self.port);
        address
            .parse()
            .map_err(|source| ConfigError::InvalidAddress { address, source })
    }
}

#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_openai_host")]
    pub host: String,
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<i32>,
}

impl ProviderSettings {
    pub fn into_config(self) -> OpenAiProviderConfig {
        OpenAiProviderConfig {
            host: self.host,
            api_key: self.api_key,
            model: self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default)]
    pub tool_call_policy: ToolCallPolicy,
    /// Capacity of the per-request channel between a run and its response stream
    #[serde(default = "default_sink_buffer")]
    pub sink_buffer: usize,
    /// Template file used instead of the bundled system prompt
    #[serde(default)]
    pub system_prompt_path: Option<PathBuf>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            tool_call_policy: ToolCallPolicy::default(),
            sink_buffer: default_sink_buffer(),
            system_prompt_path: None,
        }
    }
}

impl AgentSettings {
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_steps: self.max_steps,
            tool_call_policy: self.tool_call_policy,
            system_prompt_path: self.system_prompt_path.clone(),
        }
    }
}

/// A tool served over HTTP
#[derive(Debug, Clone, Deserialize)]
pub struct ToolSettings {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    /// JSON schema of the tool's arguments
    #[serde(default = "default_parameters")]
    pub parameters: Value,
}

impl ToolSettings {
    pub fn tool(&self) -> Tool {
        Tool::new(&self.name, &self.description, self.parameters.clone())
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub tools: Vec<ToolSettings>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(&path)
    }

    /// Load settings from an optional TOML file, overridden by `ANALYST_*` variables
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("provider.host", default_openai_host())?
            .set_default("provider.model", default_model())?
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("ANALYST")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if let Some(field) = missing_field(&error_str) {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

/// Extract the field name from a "missing field `name`" message
fn missing_field(message: &str) -> Option<&str> {
    let rest = message.strip_prefix("missing field `")?;
    rest.split('`').next()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_model() -> String {
    OPENAI_MODEL.to_string()
}

fn default_openai_host() -> String {
    OPENAI_HOST.to_string()
}

fn default_temperature() -> Option<f32> {
    Some(0.0)
}

fn default_max_steps() -> usize {
    DEFAULT_MAX_STEPS
}

fn default_sink_buffer() -> usize {
    64
}

fn default_parameters() -> Value {
    json!({"type": "object", "properties": {}})
}
