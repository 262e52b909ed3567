use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::RunContext;
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::Tool;
use crate::providers::utils::is_valid_function_name;

/// A callable tool the model can request.
///
/// Implementations must be safe to share across concurrent runs; everything that
/// varies per run arrives through the [`RunContext`].
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Name, description and argument schema advertised to the model
    fn tool(&self) -> &Tool;

    async fn execute(&self, arguments: Value, context: &RunContext) -> AgentResult<Value>;
}

/// The set of tools available to every run. Built once, then only read.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) -> AgentResult<()> {
        let name = handler.tool().name.clone();
        if !is_valid_function_name(&name) {
            return Err(AgentError::InvalidParameters(format!(
                "Tool name '{}' must match [a-zA-Z0-9_-]+",
                name
            )));
        }
        if self.handlers.contains_key(&name) {
            return Err(AgentError::InvalidParameters(format!(
                "Duplicate tool name: {}",
                name
            )));
        }
        self.order.push(name.clone());
        self.handlers.insert(name, handler);
        Ok(())
    }

    pub fn with_tool(mut self, handler: Arc<dyn ToolHandler>) -> AgentResult<Self> {
        self.register(handler)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.handlers.get(name)
    }

    /// Tool schemas in registration order
    pub fn tools(&self) -> Vec<Tool> {
        self.order
            .iter()
            .filter_map(|name| self.handlers.get(name))
            .map(|handler| handler.tool().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub async fn call(
        &self,
        name: &str,
        arguments: Value,
        context: &RunContext,
    ) -> AgentResult<Value> {
        let handler = self
            .get(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;
        handler.execute(arguments, context).await
    }
}
