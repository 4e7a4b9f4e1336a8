/// Crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Upstream error: status={status}, message={message}")]
    Upstream { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Unknown tool execution: {0}")]
    UnknownToolExecution(String),
    #[error("Tool execution already finished: {0}")]
    ToolExecutionFinished(String),
    #[error("Invalid tool status transition for {id}: {from} -> {to}")]
    InvalidToolTransition {
        id: String,
        from: String,
        to: String,
    },
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad error category used to phrase failures for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Authentication,
    Permission,
    NotFound,
    RateLimit,
    ServerError,
    Network,
    Timeout,
    Unknown,
}

/// Map an upstream HTTP status code to an error category.
#[must_use]
pub fn category_from_upstream_status(status: u16) -> ErrorCategory {
    match status {
        400 | 422 => ErrorCategory::InvalidRequest,
        401 => ErrorCategory::Authentication,
        403 => ErrorCategory::Permission,
        404 => ErrorCategory::NotFound,
        408 | 504 => ErrorCategory::Timeout,
        429 => ErrorCategory::RateLimit,
        500..=599 => ErrorCategory::ServerError,
        _ => ErrorCategory::Unknown,
    }
}

impl StreamError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            StreamError::InvalidRequest(_) => ErrorCategory::InvalidRequest,
            StreamError::Network(_) => ErrorCategory::Network,
            StreamError::Timeout(_) => ErrorCategory::Timeout,
            StreamError::Upstream { status, .. } => category_from_upstream_status(*status),
            StreamError::Config(_)
            | StreamError::Transport(_)
            | StreamError::UnknownToolExecution(_)
            | StreamError::ToolExecutionFinished(_)
            | StreamError::InvalidToolTransition { .. }
            | StreamError::Internal(_) => ErrorCategory::Unknown,
        }
    }

    /// Human-readable message handed to `on_error` for transport failures.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            StreamError::Upstream { status, message } => {
                let summary = match category_from_upstream_status(*status) {
                    ErrorCategory::InvalidRequest => "the backend rejected the request",
                    ErrorCategory::Authentication => "authentication with the backend failed",
                    ErrorCategory::Permission => "access to the backend was denied",
                    ErrorCategory::NotFound => "the streaming endpoint was not found",
                    ErrorCategory::Timeout => "the backend timed out",
                    ErrorCategory::RateLimit => "the backend is rate limiting requests",
                    ErrorCategory::ServerError => "the backend encountered an internal error",
                    ErrorCategory::Network | ErrorCategory::Unknown => "the backend returned an error",
                };
                if message.is_empty() {
                    format!("HTTP {status}: {summary}")
                } else {
                    format!("HTTP {status}: {summary} ({message})")
                }
            }
            StreamError::Network(detail) => {
                format!("Network error: unable to reach the backend ({detail})")
            }
            StreamError::Timeout(detail) => {
                format!("Network timeout: the backend did not respond in time ({detail})")
            }
            other => other.to_string(),
        }
    }
}

/// Classify a reqwest failure into the network / timeout / transport buckets.
#[must_use]
pub fn classify_reqwest_error(err: &reqwest::Error) -> StreamError {
    let message = err.to_string();
    if err.is_timeout() {
        StreamError::Timeout(message)
    } else if err.is_connect() || err.is_request() {
        StreamError::Network(message)
    } else if let Some(status) = err.status() {
        StreamError::Upstream {
            status: status.as_u16(),
            message,
        }
    } else {
        StreamError::Transport(message)
    }
}
