use serde::{Deserialize, Serialize};

/// One piece of a streamed, partially formed tool call.
///
/// Every field except the arguments chunk may be missing on any given fragment;
/// the aggregator correlates fragments by `index` and fills the rest in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFragment {
    pub index: Option<u32>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments_chunk: String,
    pub kind: Option<String>,
}

impl ToolCallFragment {
    pub fn new(index: u32) -> Self {
        Self {
            index: Some(index),
            ..Default::default()
        }
    }

    /// A fragment without a correlation key
    pub fn unindexed() -> Self {
        Self::default()
    }

    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_arguments<S: Into<String>>(mut self, chunk: S) -> Self {
        self.arguments_chunk = chunk.into();
        self
    }

    pub fn with_kind<S: Into<String>>(mut self, kind: S) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

/// One item of the model's output stream: a text delta, tool call fragments, or both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamFragment {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCallFragment>,
}

impl StreamFragment {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_call(fragment: ToolCallFragment) -> Self {
        Self {
            text: None,
            tool_calls: vec![fragment],
        }
    }

    pub fn with_tool_call(mut self, fragment: ToolCallFragment) -> Self {
        self.tool_calls.push(fragment);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.as_deref().map_or(true, str::is_empty) && self.tool_calls.is_empty()
    }
}
