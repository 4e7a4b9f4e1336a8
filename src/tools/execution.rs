use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::stream::ToolCall;

/// Lifecycle of one tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl ToolStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, ToolStatus::Completed | ToolStatus::Error)
    }

    /// Whether the tracker allows moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: ToolStatus) -> bool {
        match self {
            ToolStatus::Pending => next != ToolStatus::Pending,
            ToolStatus::Running => next.is_terminal(),
            ToolStatus::Completed | ToolStatus::Error => false,
        }
    }
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolStatus::Pending => write!(f, "pending"),
            ToolStatus::Running => write!(f, "running"),
            ToolStatus::Completed => write!(f, "completed"),
            ToolStatus::Error => write!(f, "error"),
        }
    }
}

/// Tracked record of a tool call requested during a stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolExecution {
    pub id: String,
    pub tool_call: ToolCall,
    pub status: ToolStatus,
    /// Unix milliseconds.
    pub started_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
}

impl ToolExecution {
    pub(crate) fn pending(tool_call: ToolCall, started_at: u64) -> Self {
        Self {
            id: tool_call.id.clone(),
            tool_call,
            status: ToolStatus::Pending,
            started_at,
            ended_at: None,
            result: None,
            error: None,
            progress: None,
        }
    }

    #[must_use]
    pub fn function_name(&self) -> &str {
        self.tool_call.function_name()
    }

    /// Wall-clock duration in milliseconds once the execution has ended.
    #[must_use]
    pub fn duration_ms(&self) -> Option<u64> {
        self.ended_at
            .map(|ended| ended.saturating_sub(self.started_at))
    }
}
