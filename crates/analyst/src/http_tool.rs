use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::RunContext;
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::Tool;
use crate::registry::ToolHandler;

/// A tool whose implementation lives behind an HTTP endpoint.
///
/// The endpoint receives a POST with the tool name, the parsed arguments and the
/// run's organization/connection/schema, authenticated with the run's token, and
/// answers with the JSON result.
pub struct HttpTool {
    tool: Tool,
    url: String,
    client: Client,
}

impl HttpTool {
    pub fn new<S: Into<String>>(tool: Tool, url: S) -> AgentResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| AgentError::Internal(e.to_string()))?;

        Ok(Self {
            tool,
            url: url.into(),
            client,
        })
    }

    fn payload(&self, arguments: Value, context: &RunContext) -> Value {
        json!({
            "name": self.tool.name,
            "arguments": arguments,
            "organization_id": context.organization_id,
            "connection_id": context.connection_id,
            "schema": context.schema,
        })
    }
}

#[async_trait]
impl ToolHandler for HttpTool {
    fn tool(&self) -> &Tool {
        &self.tool
    }

    async fn execute(&self, arguments: Value, context: &RunContext) -> AgentResult<Value> {
        let mut request = self.client.post(&self.url).json(&self.payload(arguments, context));
        if !context.auth_token.is_empty() {
            request = request.bearer_auth(&context.auth_token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AgentError::ExecutionError(format!("{}: {}", self.tool.name, e)))?;

        match response.status() {
            status if status.is_success() => {
                let body = response.bytes().await.map_err(|e| {
                    AgentError::ExecutionError(format!("{}: {}", self.tool.name, e))
                })?;
                if body.is_empty() {
                    return Ok(Value::Null);
                }
                serde_json::from_slice(&body).map_err(|e| {
                    AgentError::ExecutionError(format!(
                        "{}: invalid response body: {}",
                        self.tool.name, e
                    ))
                })
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                let body = response.text().await.unwrap_or_default();
                Err(AgentError::InvalidParameters(body))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(AgentError::ExecutionError(format!(
                    "{} failed with {}: {}",
                    self.tool.name, status, body
                )))
            }
        }
    }
}
