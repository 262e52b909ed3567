use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::aggregator::FragmentAggregator;
use crate::errors::{RunError, RunResult};
use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::Provider;
use crate::sink::StreamSink;

/// Run one streaming model call and fold everything it produces into a single
/// assistant message.
///
/// Text deltas are forwarded to the sink as they arrive. Tool call fragments are
/// assembled by a [`FragmentAggregator`] owned by this call, so a cancelled or
/// failed turn leaves nothing behind.
pub async fn generate(
    provider: &dyn Provider,
    messages: &[Message],
    tools: &[Tool],
    sink: Option<&dyn StreamSink>,
    cancel: &CancellationToken,
) -> RunResult<Message> {
    let mut stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(RunError::Cancelled),
        opened = provider.stream(messages, tools) => {
            opened.map_err(|e| RunError::Upstream(format!("{:#}", e)))?
        }
    };

    let mut content = String::new();
    let mut aggregator = FragmentAggregator::new();

    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RunError::Cancelled),
            item = stream.next() => item,
        };
        let Some(item) = item else {
            break;
        };

        let fragment = item.map_err(|e| RunError::Upstream(format!("{:#}", e)))?;

        if let Some(delta) = fragment.text.filter(|text| !text.is_empty()) {
            if let Some(sink) = sink {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(RunError::Cancelled),
                    _ = sink.on_text(&delta) => {}
                }
            }
            content.push_str(&delta);
        }

        aggregator.extend(fragment.tool_calls);
    }

    if aggregator.dropped_fragments() > 0 {
        tracing::warn!(
            dropped = aggregator.dropped_fragments(),
            "some tool call fragments had no index and were ignored"
        );
    }

    let tool_calls = aggregator.into_requests();
    tracing::debug!(
        text_len = content.len(),
        tool_calls = tool_calls.len(),
        "generation turn finished"
    );

    Ok(Message::Assistant {
        content,
        tool_calls,
    })
}
