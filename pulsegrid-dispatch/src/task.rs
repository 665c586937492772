//! Task dispatch contract types.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DispatchResult;
use crate::step::StepRunner;

/// One delivery of a dispatched event to its handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    /// Correlation id for the task; stable across retries.
    pub id: String,
    /// Event name the task was dispatched under.
    pub name: String,
    /// Event payload, verbatim from `send`.
    pub payload: Value,
    /// 1-based delivery attempt.
    pub attempt: u32,
}

/// Receipt returned by a successful `send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub task_ids: Vec<String>,
}

/// A task whose retries were exhausted, kept for inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub task_id: String,
    pub event_name: String,
    pub payload: Value,
    pub error: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

/// Boxed future returned by a task handler.
pub type TaskFuture = Pin<Box<dyn Future<Output = DispatchResult<Value>> + Send>>;

/// A registered task handler.
///
/// Receives the event and a [`StepRunner`] whose memo survives retries of
/// the same task, so completed steps are not re-executed.
pub type TaskHandler = Arc<dyn Fn(TaskEvent, StepRunner) -> TaskFuture + Send + Sync>;

/// Fire-and-forget event dispatch with at-least-once execution.
///
/// `send` fails by rejecting the call; once a receipt is returned the task
/// will run until it succeeds, exhausts its retries into the dead-letter
/// store, or the process shuts down.
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    async fn send(&self, event_name: &str, payload: Value) -> DispatchResult<DispatchReceipt>;
}
