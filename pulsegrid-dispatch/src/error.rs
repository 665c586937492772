//! Error types for task dispatch.

use thiserror::Error;

/// Errors surfaced by the dispatcher and by task handlers.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// `send` was called for an event with no registered handler.
    #[error("no handler registered for event '{0}'")]
    UnknownEvent(String),

    /// The dispatcher rejected the send outright.
    #[error("dispatch rejected: {0}")]
    Rejected(String),

    /// The dispatcher is shutting down and accepts no new tasks.
    #[error("dispatcher is shutting down")]
    ShuttingDown,

    /// A handler step failed; triggers the retry policy.
    #[error("task handler failed: {0}")]
    HandlerFailed(String),

    /// The task exceeded its execution time budget and was terminated.
    #[error("task timed out after {0}ms")]
    TimedOut(u64),

    /// A step result failed to (de)serialize through the memo store.
    #[error("step result serialization failed: {0}")]
    Serialization(String),
}

impl DispatchError {
    /// Wrap any error as a handler failure.
    pub fn handler(err: impl std::fmt::Display) -> Self {
        DispatchError::HandlerFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::Serialization(err.to_string())
    }
}

/// Result type alias for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
