use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use super::cancel::CancelHandle;
use crate::tools::ToolExecution;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Open,
    Ended,
    Aborted,
    Failed,
}

impl SessionStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Ended | SessionStatus::Aborted | SessionStatus::Failed
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "idle"),
            SessionStatus::Open => write!(f, "open"),
            SessionStatus::Ended => write!(f, "ended"),
            SessionStatus::Aborted => write!(f, "aborted"),
            SessionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Live state of one request/response exchange.
#[derive(Debug)]
pub struct StreamSession {
    pub id: Uuid,
    status: SessionStatus,
    cancel: CancelHandle,
    text: String,
    error: Option<String>,
    token_count: usize,
}

impl StreamSession {
    #[must_use]
    pub fn new(cancel: CancelHandle) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: SessionStatus::Idle,
            cancel,
            text: String::new(),
            error: None,
            token_count: 0,
        }
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn cancel_handle(&self) -> &CancelHandle {
        &self.cancel
    }

    /// Accumulated token text so far.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn token_count(&self) -> usize {
        self.token_count
    }

    /// Move to `next`. A terminal status is final; returns `false` when the
    /// move was refused.
    pub fn transition(&mut self, next: SessionStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        if self.status != next {
            tracing::debug!(
                session_id = %self.id,
                from = %self.status,
                to = %next,
                "stream session transition"
            );
        }
        self.status = next;
        true
    }

    pub fn push_token(&mut self, text: &str) {
        self.text.push_str(text);
        self.token_count += 1;
    }

    /// Record the failure message and move to `failed`.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if !self.transition(SessionStatus::Failed) {
            return false;
        }
        self.error = Some(message.into());
        true
    }

    pub(crate) fn into_outcome(
        self,
        active_tools: Vec<ToolExecution>,
        tool_history: Vec<ToolExecution>,
    ) -> SessionOutcome {
        SessionOutcome {
            session_id: self.id,
            status: self.status,
            text: self.text,
            error: self.error,
            token_count: self.token_count,
            active_tools,
            tool_history,
        }
    }
}

/// Snapshot of a session taken at its terminal transition.
#[derive(Debug, Clone, Serialize)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub token_count: usize,
    /// Executions with no result when the stream ended.
    pub active_tools: Vec<ToolExecution>,
    pub tool_history: Vec<ToolExecution>,
}
