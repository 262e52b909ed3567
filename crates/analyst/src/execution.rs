use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::config::{RunContext, ToolCallPolicy};
use crate::errors::{AgentError, RunError, RunResult};
use crate::models::message::{Message, ToolRequest};
use crate::registry::ToolRegistry;

/// Dispatch a single tool request and tag the outcome with the request's id
async fn dispatch(registry: &ToolRegistry, request: &ToolRequest, context: &RunContext) -> Message {
    let result = match &request.tool_call {
        Ok(call) => {
            let result = registry
                .call(&call.name, call.arguments.clone(), context)
                .await;
            if let Err(e) = &result {
                tracing::warn!(id = %request.id, tool = %call.name, "tool call failed: {}", e);
            }
            result
        }
        Err(e) => Err(e.clone()),
    };
    Message::tool_result(request.id.clone(), result)
}

/// Answers for a turn that contains a call with unparseable arguments. Nothing in
/// the turn is run; every request still gets a result so the model can retry.
fn abort_turn(requests: &[ToolRequest]) -> Vec<Message> {
    requests
        .iter()
        .map(|request| {
            let result = match &request.tool_call {
                Err(e) => Err(e.clone()),
                Ok(call) => Err(AgentError::Skipped(format!(
                    "{} was not run because another tool call in the same turn had malformed arguments",
                    call.name
                ))),
            };
            Message::tool_result(request.id.clone(), result)
        })
        .collect()
}

/// Execute every tool request of one assistant turn and return one tool result
/// message per request, in request order.
///
/// Tool failures become failure results. Only cancellation is an error here, and
/// it discards all results of the turn.
pub async fn execute(
    registry: &ToolRegistry,
    requests: &[ToolRequest],
    context: &RunContext,
    policy: ToolCallPolicy,
    cancel: &CancellationToken,
) -> RunResult<Vec<Message>> {
    if cancel.is_cancelled() {
        return Err(RunError::Cancelled);
    }

    let malformed = requests
        .iter()
        .any(|r| matches!(r.tool_call, Err(AgentError::ArgumentsParse { .. })));
    if malformed {
        tracing::warn!(
            requests = requests.len(),
            "aborting tool execution for a turn with malformed arguments"
        );
        return Ok(abort_turn(requests));
    }

    let work = async {
        match policy {
            ToolCallPolicy::Concurrent => {
                join_all(
                    requests
                        .iter()
                        .map(|request| dispatch(registry, request, context)),
                )
                .await
            }
            ToolCallPolicy::Sequential => {
                let mut results = Vec::with_capacity(requests.len());
                for request in requests {
                    results.push(dispatch(registry, request, context).await);
                }
                results
            }
        }
    };

    // dropping `work` drops every in-flight tool future with it
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RunError::Cancelled),
        results = work => Ok(results),
    }
}
