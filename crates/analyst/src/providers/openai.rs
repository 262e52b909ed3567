use anyhow::{anyhow, Result};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{FragmentStream, Provider};
use super::configs::OpenAiProviderConfig;
use super::utils::{
    check_openai_context_length_error, messages_to_openai_spec, openai_chunk_to_fragment,
    tools_to_openai_spec,
};
use crate::models::message::Message;
use crate::models::tool::Tool;

/// Payload OpenAI sends as the last SSE event of a completion
const STREAM_DONE: &str = "[DONE]";

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn build_payload(&self, messages: &[Message], tools: &[Tool]) -> Result<Value> {
        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_to_openai_spec(messages),
            "stream": true,
        });

        let object = payload
            .as_object_mut()
            .ok_or_else(|| anyhow!("payload must be a JSON object"))?;
        if !tools.is_empty() {
            object.insert("tools".to_string(), json!(tools_to_openai_spec(tools)?));
        }
        if let Some(temp) = self.config.temperature {
            object.insert("temperature".to_string(), json!(temp));
        }
        if let Some(tokens) = self.config.max_tokens {
            object.insert("max_tokens".to_string(), json!(tokens));
        }

        Ok(payload)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn stream(&self, messages: &[Message], tools: &[Tool]) -> Result<FragmentStream> {
        let payload = self.build_payload(messages, tools)?;
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        tracing::debug!(model = %self.config.model, messages = messages.len(), "starting completion stream");
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            // Raise specific error if context length is exceeded
            if let Ok(value) = serde_json::from_str::<Value>(&body) {
                if let Some(err) = value.get("error").and_then(check_openai_context_length_error) {
                    return Err(err.into());
                }
            }
            return Err(anyhow!("Request failed: {}\nBody: {}", status, body));
        }

        let mut events = Box::pin(response.bytes_stream().eventsource());
        let stream = async_stream::try_stream! {
            let mut done = false;
            while let Some(event) = events.next().await {
                let event = event.map_err(|e| anyhow!("SSE stream error: {}", e))?;
                let data = event.data.trim();
                if data.is_empty() {
                    continue;
                }
                if data == STREAM_DONE {
                    done = true;
                    break;
                }

                let chunk: Value = serde_json::from_str(data)
                    .map_err(|e| anyhow!("Failed to parse stream chunk: {}", e))?;
                if let Some(fragment) = openai_chunk_to_fragment(&chunk)? {
                    yield fragment;
                }
            }
            if !done {
                Err::<(), _>(anyhow!("stream ended before {}", STREAM_DONE))?;
            }
        };

        Ok(Box::pin(stream))
    }
}
