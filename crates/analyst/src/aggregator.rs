//! Reassembly of streamed tool calls.
//!
//! Providers stream tool calls as fragments keyed by `index`. Identifying metadata
//! (id, name, kind) may show up on any fragment, while argument text arrives in
//! pieces that have to be concatenated in arrival order. The aggregator lives for
//! exactly one generation turn.

use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

use crate::errors::{AgentError, AgentResult};
use crate::models::fragment::ToolCallFragment;
use crate::models::message::ToolRequest;
use crate::models::tool::ToolCall;

/// Adopt `incoming` only while `slot` is still unset. Empty strings count as unset.
fn fill_once(slot: &mut Option<String>, incoming: Option<String>) {
    let unset = slot.as_deref().map_or(true, str::is_empty);
    if unset {
        if let Some(value) = incoming.filter(|v| !v.is_empty()) {
            *slot = Some(value);
        }
    }
}

/// The running state of a single tool call while its fragments are still arriving
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialToolCall {
    pub index: u32,
    pub id: Option<String>,
    pub name: Option<String>,
    pub kind: Option<String>,
    pub arguments: String,
}

impl PartialToolCall {
    fn new(index: u32) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    /// Fold one fragment into this call: arguments append, everything else is fill-once.
    pub fn merge(mut self, fragment: ToolCallFragment) -> Self {
        self.arguments.push_str(&fragment.arguments_chunk);
        fill_once(&mut self.id, fragment.id);
        fill_once(&mut self.name, fragment.name);
        fill_once(&mut self.kind, fragment.kind);
        self
    }

    /// Parse the accumulated arguments. No argument text at all means an empty object.
    pub fn into_request(self) -> ToolRequest {
        let id = self.id.unwrap_or_else(|| format!("call_{}", self.index));
        let name = self.name.unwrap_or_default();

        let parsed = if self.arguments.trim().is_empty() {
            Ok(Value::Object(Default::default()))
        } else {
            serde_json::from_str::<Value>(&self.arguments)
        };

        let tool_call: AgentResult<ToolCall> = match parsed {
            Ok(arguments) => Ok(ToolCall::new(name, arguments)),
            Err(e) => Err(AgentError::ArgumentsParse {
                id: id.clone(),
                name,
                raw: self.arguments,
                message: e.to_string(),
            }),
        };

        ToolRequest::new(id, tool_call)
    }
}

/// Collects tool call fragments for one generation turn
#[derive(Debug, Default)]
pub struct FragmentAggregator {
    calls: BTreeMap<u32, PartialToolCall>,
    dropped: usize,
}

impl FragmentAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: ToolCallFragment) {
        let Some(index) = fragment.index else {
            self.dropped += 1;
            tracing::warn!(
                id = ?fragment.id,
                name = ?fragment.name,
                "dropping tool call fragment without an index"
            );
            return;
        };

        let call = self
            .calls
            .remove(&index)
            .unwrap_or_else(|| PartialToolCall::new(index));
        self.calls.insert(index, call.merge(fragment));
    }

    pub fn extend<I: IntoIterator<Item = ToolCallFragment>>(&mut self, fragments: I) {
        for fragment in fragments {
            self.push(fragment);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Number of fragments dropped because they could not be routed
    pub fn dropped_fragments(&self) -> usize {
        self.dropped
    }

    /// The assembled calls in ascending index order, arguments still unparsed
    pub fn finish(self) -> Vec<PartialToolCall> {
        self.calls.into_values().collect()
    }

    /// Finish the turn and parse every call's arguments.
    ///
    /// Ids are unique within the turn: a repeated id gets the call's index appended.
    pub fn into_requests(self) -> Vec<ToolRequest> {
        let mut seen = HashSet::new();
        self.finish()
            .into_iter()
            .map(|mut call| {
                let id = call
                    .id
                    .take()
                    .unwrap_or_else(|| format!("call_{}", call.index));
                let mut unique = id.clone();
                while seen.contains(&unique) {
                    unique = format!("{}_{}", unique, call.index);
                }
                if unique != id {
                    tracing::warn!(
                        index = call.index,
                        id = %id,
                        renamed = %unique,
                        "renaming repeated tool call id"
                    );
                }
                seen.insert(unique.clone());
                call.id = Some(unique);
                call.into_request()
            })
            .collect()
    }
}
