//! Pulsegrid Task Dispatch
//!
//! The contract between the webhook hot path and the asynchronous
//! normalizer, plus an in-process implementation:
//!
//! - [`TaskDispatcher`]: fire an event, get a receipt; delivery is
//!   at-least-once with bounded retries and dead-letter capture
//! - [`StepRunner`]: per-step idempotency so a retried task skips the steps
//!   that already completed
//! - [`InProcessDispatcher`]: tokio-based executor with exponential backoff
//!   and a per-task execution time budget
//!
//! In a multi-node deployment the same contract would be backed by a
//! durable queue; the hot path and the normalizer are written against the
//! trait and do not care.

pub mod error;
pub mod in_process;
pub mod step;
pub mod task;

pub use error::{DispatchError, DispatchResult};
pub use in_process::{
    DispatchMetrics, DispatchMetricsSnapshot, DispatcherConfig, InProcessDispatcher,
};
pub use step::StepRunner;
pub use task::{DeadLetter, DispatchReceipt, TaskDispatcher, TaskEvent, TaskFuture, TaskHandler};
