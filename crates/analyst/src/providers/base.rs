use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::models::fragment::StreamFragment;
use crate::models::message::Message;
use crate::models::tool::Tool;

/// The output of one streaming model call. An `Err` item means the stream ended
/// abnormally; nothing after it is read.
pub type FragmentStream = BoxStream<'static, Result<StreamFragment>>;

/// Base trait for streaming LLM providers (OpenAI and compatible endpoints)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Start generating the next assistant turn for the given history. The history
    /// already includes the system instruction as its first message.
    async fn stream(&self, messages: &[Message], tools: &[Tool]) -> Result<FragmentStream>;
}
