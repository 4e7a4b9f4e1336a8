use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A function invocation requested by the model mid-stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "default_tool_kind")]
    pub kind: String,
    pub function: ToolFunction,
}

fn default_tool_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFunction {
    pub name: String,
    /// Arguments as JSON text, exactly as the backend sent them.
    pub arguments: String,
}

impl ToolCall {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: default_tool_kind(),
            function: ToolFunction {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    #[must_use]
    pub fn function_name(&self) -> &str {
        &self.function.name
    }

    /// Parse the argument text, `None` when it is not valid JSON.
    #[must_use]
    pub fn arguments_value(&self) -> Option<Value> {
        serde_json::from_str(&self.function.arguments).ok()
    }
}

/// Output of a tool execution reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    pub result: Value,
    /// Set when the backend reports the execution as failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Application-level event decoded from one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Started { meta: Value },
    Token { text: String },
    ToolCallRequested(ToolCall),
    ToolResultReceived(ToolResult),
    Ended { meta: Option<Value> },
    Failed { message: String },
}

impl StreamEvent {
    /// `Ended` and `Failed` close the session.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Ended { .. } | StreamEvent::Failed { .. })
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Started { .. } => "started",
            StreamEvent::Token { .. } => "token",
            StreamEvent::ToolCallRequested(_) => "tool_call_requested",
            StreamEvent::ToolResultReceived(_) => "tool_result_received",
            StreamEvent::Ended { .. } => "ended",
            StreamEvent::Failed { .. } => "failed",
        }
    }
}
