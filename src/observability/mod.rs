use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::session::{SessionOutcome, SessionStatus};

/// Initialize the tracing subscriber with the configured log level.
///
/// Maps config log levels to tracing levels:
/// - "DISABLED" -> no subscriber installed
/// - "WARNING" -> WARN
/// - "CRITICAL" -> ERROR
/// - Others map directly (TRACE, DEBUG, INFO, ERROR)
///
/// Output goes to stderr so streamed text on stdout stays clean.
pub fn init_tracing(log_level: &str) {
    let Some(directive) = tracing_directive(log_level) else {
        return;
    };

    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("INFO"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn tracing_directive(log_level: &str) -> Option<String> {
    let level = log_level.trim().to_uppercase();
    match level.as_str() {
        "DISABLED" => None,
        "WARNING" => Some("WARN".to_string()),
        "CRITICAL" => Some("ERROR".to_string()),
        _ => Some(level),
    }
}

/// Log the summary of a finished session.
pub fn log_session_complete(outcome: &SessionOutcome, elapsed: Duration) {
    let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    let tool_errors = outcome
        .tool_history
        .iter()
        .filter(|execution| execution.error.is_some())
        .count();
    match outcome.status {
        SessionStatus::Failed => tracing::warn!(
            session_id = %outcome.session_id,
            status = %outcome.status,
            tokens = outcome.token_count,
            chars = outcome.text.len(),
            tools_finished = outcome.tool_history.len(),
            tool_errors,
            error = outcome.error.as_deref().unwrap_or(""),
            elapsed_ms,
            "stream session complete"
        ),
        _ => tracing::info!(
            session_id = %outcome.session_id,
            status = %outcome.status,
            tokens = outcome.token_count,
            chars = outcome.text.len(),
            tools_finished = outcome.tool_history.len(),
            tools_pending = outcome.active_tools.len(),
            tool_errors,
            elapsed_ms,
            "stream session complete"
        ),
    }
}
