//! Structured errors for the arcade-worker protocol.
//!
//! Every error leaves the process as one JSON line carrying a stable code.

use serde::Serialize;

/// Errors raised while handling one event line.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The line is not a recognised event.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The interceptor rejected or failed the event.
    #[error(transparent)]
    Core(#[from] arcade_core::Error),
}

/// Wire form of a [`WorkerError`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorOutput {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl From<&WorkerError> for ErrorOutput {
    fn from(err: &WorkerError) -> Self {
        let rendered = err.to_string();
        let (code, message) = match rendered.split_once(": ") {
            Some((code, message)) => (code.to_string(), message.to_string()),
            None => ("INTERNAL".to_string(), rendered.clone()),
        };
        let retryable = matches!(err, WorkerError::Core(e) if e.is_retryable());

        Self { code, message, retryable }
    }
}
