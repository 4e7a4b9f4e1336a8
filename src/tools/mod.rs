pub mod execution;

pub use execution::{ToolExecution, ToolStatus};

use serde_json::Value;

use crate::error::StreamError;
use crate::stream::{ToolCall, ToolResult};
use crate::util::unix_now_millis;

/// Message attached to executions still in flight when a session is cancelled.
pub const ABORTED_MESSAGE: &str = "Tool execution aborted";

/// Per-session state machine for tool executions.
///
/// Executions live in `active` until they reach a terminal status and are then
/// moved to `history`, exactly once. An id is never present in both.
#[derive(Debug, Default)]
pub struct ToolExecutionTracker {
    active: Vec<ToolExecution>,
    history: Vec<ToolExecution>,
}

impl ToolExecutionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a requested call. It is created `pending` and moved to
    /// `running` right away.
    ///
    /// Returns `None` when the id is already tracked in this session.
    pub fn register(&mut self, tool_call: ToolCall) -> Option<&ToolExecution> {
        if self.contains(&tool_call.id) {
            tracing::warn!(
                tool_call_id = %tool_call.id,
                "duplicate tool call id ignored"
            );
            return None;
        }
        let mut execution = ToolExecution::pending(tool_call, unix_now_millis());
        execution.status = ToolStatus::Running;
        tracing::debug!(
            tool_call_id = %execution.id,
            function = execution.function_name(),
            "tool execution running"
        );
        self.active.push(execution);
        self.active.last()
    }

    /// Apply a backend-reported result to the matching active execution.
    ///
    /// Matching uses `tool_call_id` when present; otherwise the oldest active
    /// execution with the same function name; otherwise, when the result names
    /// neither, the oldest active execution.
    pub fn record_result(&mut self, result: &ToolResult) -> Option<&ToolExecution> {
        let Some(index) = self.match_result(result) else {
            tracing::debug!(
                tool_call_id = result.tool_call_id.as_deref().unwrap_or(""),
                function = result.function_name.as_deref().unwrap_or(""),
                "tool result did not match an active execution"
            );
            return None;
        };
        let status = if result.is_error() {
            ToolStatus::Error
        } else {
            ToolStatus::Completed
        };
        Some(self.finish(
            index,
            status,
            Some(result.result.clone()),
            result.error.clone(),
        ))
    }

    /// Explicitly move an execution to `status`.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::ToolExecutionFinished`] for an execution already in
    /// history, [`StreamError::UnknownToolExecution`] for an unknown id, and
    /// [`StreamError::InvalidToolTransition`] for a backwards transition.
    pub fn update_status(
        &mut self,
        id: &str,
        status: ToolStatus,
        result: Option<Value>,
        error: Option<String>,
    ) -> Result<&ToolExecution, StreamError> {
        let index = self.active_index(id)?;
        let current = self.active[index].status;
        if !current.can_transition_to(status) {
            return Err(StreamError::InvalidToolTransition {
                id: id.to_string(),
                from: current.to_string(),
                to: status.to_string(),
            });
        }
        if status.is_terminal() {
            return Ok(self.finish(index, status, result, error));
        }
        let execution = &mut self.active[index];
        execution.status = status;
        if result.is_some() {
            execution.result = result;
        }
        Ok(&self.active[index])
    }

    /// Attach a progress note to an active execution.
    ///
    /// # Errors
    ///
    /// Same lookup errors as [`Self::update_status`].
    pub fn report_progress(&mut self, id: &str, message: impl Into<String>) -> Result<(), StreamError> {
        let index = self.active_index(id)?;
        self.active[index].progress = Some(message.into());
        Ok(())
    }

    /// Force every active execution to `error` and move it to history.
    ///
    /// Returns how many executions were aborted.
    pub fn abort_all(&mut self) -> usize {
        let ended_at = unix_now_millis();
        let aborted = self.active.len();
        for mut execution in self.active.drain(..) {
            execution.status = ToolStatus::Error;
            execution.error = Some(ABORTED_MESSAGE.to_string());
            execution.ended_at = Some(ended_at);
            self.history.push(execution);
        }
        if aborted > 0 {
            tracing::debug!(aborted, "aborted active tool executions");
        }
        aborted
    }

    #[must_use]
    pub fn active(&self) -> &[ToolExecution] {
        &self.active
    }

    #[must_use]
    pub fn history(&self) -> &[ToolExecution] {
        &self.history
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ToolExecution> {
        self.active
            .iter()
            .chain(self.history.iter())
            .find(|execution| execution.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    #[must_use]
    pub fn into_parts(self) -> (Vec<ToolExecution>, Vec<ToolExecution>) {
        (self.active, self.history)
    }

    fn active_index(&self, id: &str) -> Result<usize, StreamError> {
        if let Some(index) = self.active.iter().position(|execution| execution.id == id) {
            return Ok(index);
        }
        if self.history.iter().any(|execution| execution.id == id) {
            Err(StreamError::ToolExecutionFinished(id.to_string()))
        } else {
            Err(StreamError::UnknownToolExecution(id.to_string()))
        }
    }

    fn match_result(&self, result: &ToolResult) -> Option<usize> {
        if let Some(id) = result.tool_call_id.as_deref() {
            return self.active.iter().position(|execution| execution.id == id);
        }
        // Ambiguous when two active calls share a function name; the oldest wins.
        if let Some(name) = result.function_name.as_deref() {
            return self
                .active
                .iter()
                .position(|execution| execution.function_name() == name);
        }
        (!self.active.is_empty()).then_some(0)
    }

    fn finish(
        &mut self,
        index: usize,
        status: ToolStatus,
        result: Option<Value>,
        error: Option<String>,
    ) -> &ToolExecution {
        let mut execution = self.active.remove(index);
        execution.status = status;
        execution.ended_at = Some(unix_now_millis());
        if result.is_some() {
            execution.result = result;
        }
        execution.error = error;
        tracing::debug!(
            tool_call_id = %execution.id,
            status = %status,
            "tool execution finished"
        );
        self.history.push(execution);
        &self.history[self.history.len() - 1]
    }
}
