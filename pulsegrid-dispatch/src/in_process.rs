//! In-process task executor.
//!
//! Runs registered handlers on the tokio runtime with bounded-attempt
//! exponential backoff and dead-letter capture. Delivery is at-least-once:
//! a task that times out or fails mid-way is re-run from the beginning with
//! the same [`StepRunner`], so completed steps are skipped and incomplete
//! ones repeat.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::timeout;
use uuid::Uuid;

use crate::error::{DispatchError, DispatchResult};
use crate::step::StepRunner;
use crate::task::{DeadLetter, DispatchReceipt, TaskDispatcher, TaskEvent, TaskFuture, TaskHandler};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the in-process dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum delivery attempts per task (default: 5)
    pub max_attempts: u32,

    /// Base backoff delay; doubles each retry (default: 1s)
    pub base_delay: Duration,

    /// Ceiling for the backoff delay (default: 60s)
    pub max_delay: Duration,

    /// Execution time budget per attempt; an attempt past the budget is
    /// terminated and retried from the beginning (default: 30s)
    pub task_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            task_timeout: Duration::from_secs(30),
        }
    }
}

impl DispatcherConfig {
    /// Create a DispatcherConfig from environment variables.
    ///
    /// Environment variables:
    /// - `PULSEGRID_DISPATCH_MAX_ATTEMPTS` (default: 5)
    /// - `PULSEGRID_DISPATCH_BASE_DELAY_MS` (default: 1000)
    /// - `PULSEGRID_DISPATCH_MAX_DELAY_MS` (default: 60000)
    /// - `PULSEGRID_DISPATCH_TASK_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_attempts = std::env::var("PULSEGRID_DISPATCH_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_attempts);

        let base_delay = Duration::from_millis(
            std::env::var("PULSEGRID_DISPATCH_BASE_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.base_delay.as_millis() as u64),
        );

        let max_delay = Duration::from_millis(
            std::env::var("PULSEGRID_DISPATCH_MAX_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_delay.as_millis() as u64),
        );

        let task_timeout = Duration::from_secs(
            std::env::var("PULSEGRID_DISPATCH_TASK_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.task_timeout.as_secs()),
        );

        Self {
            max_attempts,
            base_delay,
            max_delay,
            task_timeout,
        }
    }

    /// Configuration for development/testing with millisecond backoff.
    pub fn development() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(50),
            task_timeout: Duration::from_secs(2),
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for dispatch activity since startup.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Tasks accepted by `send`
    pub tasks_dispatched: AtomicU64,

    /// Tasks whose handler eventually succeeded
    pub tasks_succeeded: AtomicU64,

    /// Individual failed attempts that were retried
    pub attempts_retried: AtomicU64,

    /// Tasks that exhausted their retries into the dead-letter store
    pub tasks_dead_lettered: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot of all counters.
    pub fn snapshot(&self) -> DispatchMetricsSnapshot {
        DispatchMetricsSnapshot {
            tasks_dispatched: self.tasks_dispatched.load(Ordering::Relaxed),
            tasks_succeeded: self.tasks_succeeded.load(Ordering::Relaxed),
            attempts_retried: self.attempts_retried.load(Ordering::Relaxed),
            tasks_dead_lettered: self.tasks_dead_lettered.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`DispatchMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchMetricsSnapshot {
    pub tasks_dispatched: u64,
    pub tasks_succeeded: u64,
    pub attempts_retried: u64,
    pub tasks_dead_lettered: u64,
}

// ============================================================================
// DISPATCHER
// ============================================================================

/// Tokio-based at-least-once task executor.
pub struct InProcessDispatcher {
    config: DispatcherConfig,
    handlers: DashMap<String, TaskHandler>,
    dead_letters: Arc<DashMap<String, DeadLetter>>,
    metrics: Arc<DispatchMetrics>,
    shutdown_tx: watch::Sender<bool>,
}

impl InProcessDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            handlers: DashMap::new(),
            dead_letters: Arc::new(DashMap::new()),
            metrics: Arc::new(DispatchMetrics::new()),
            shutdown_tx,
        }
    }

    /// Register the handler for an event name, replacing any previous one.
    pub fn register<F>(&self, event_name: &str, handler: F)
    where
        F: Fn(TaskEvent, StepRunner) -> TaskFuture + Send + Sync + 'static,
    {
        self.handlers.insert(event_name.to_string(), Arc::new(handler));
    }

    /// Stop accepting tasks and wake tasks sleeping in backoff.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }

    /// Tasks whose retries were exhausted, newest last.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        let mut letters: Vec<DeadLetter> =
            self.dead_letters.iter().map(|e| e.value().clone()).collect();
        letters.sort_by_key(|l| l.failed_at);
        letters
    }
}

#[async_trait]
impl TaskDispatcher for InProcessDispatcher {
    async fn send(&self, event_name: &str, payload: Value) -> DispatchResult<DispatchReceipt> {
        if *self.shutdown_tx.borrow() {
            return Err(DispatchError::ShuttingDown);
        }

        let handler = self
            .handlers
            .get(event_name)
            .map(|h| h.value().clone())
            .ok_or_else(|| DispatchError::UnknownEvent(event_name.to_string()))?;

        let task_id = Uuid::now_v7().to_string();
        self.metrics.tasks_dispatched.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(task_id = %task_id, event = event_name, "Task dispatched");

        let run = TaskRun {
            task_id: task_id.clone(),
            event_name: event_name.to_string(),
            payload,
            handler,
            config: self.config.clone(),
            dead_letters: Arc::clone(&self.dead_letters),
            metrics: Arc::clone(&self.metrics),
            shutdown_rx: self.shutdown_tx.subscribe(),
        };
        tokio::spawn(run.execute());

        Ok(DispatchReceipt {
            task_ids: vec![task_id],
        })
    }
}

/// One spawned task execution: the retry loop.
struct TaskRun {
    task_id: String,
    event_name: String,
    payload: Value,
    handler: TaskHandler,
    config: DispatcherConfig,
    dead_letters: Arc<DashMap<String, DeadLetter>>,
    metrics: Arc<DispatchMetrics>,
    shutdown_rx: watch::Receiver<bool>,
}

impl TaskRun {
    async fn execute(mut self) {
        let steps = StepRunner::new();
        let mut last_error = DispatchError::handler("task never ran");

        for attempt in 1..=self.config.max_attempts {
            let event = TaskEvent {
                id: self.task_id.clone(),
                name: self.event_name.clone(),
                payload: self.payload.clone(),
                attempt,
            };

            let outcome = match timeout(
                self.config.task_timeout,
                (self.handler)(event, steps.clone()),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(DispatchError::TimedOut(
                    self.config.task_timeout.as_millis() as u64,
                )),
            };

            match outcome {
                Ok(_) => {
                    self.metrics.tasks_succeeded.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        task_id = %self.task_id,
                        event = %self.event_name,
                        attempt,
                        "Task completed"
                    );
                    return;
                }
                Err(err) => {
                    tracing::warn!(
                        task_id = %self.task_id,
                        event = %self.event_name,
                        attempt,
                        max_attempts = self.config.max_attempts,
                        error = %err,
                        "Task attempt failed"
                    );
                    last_error = err;
                }
            }

            if attempt == self.config.max_attempts {
                break;
            }
            self.metrics.attempts_retried.fetch_add(1, Ordering::Relaxed);

            let delay = backoff_for(&self.config, attempt);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        last_error = DispatchError::ShuttingDown;
                        break;
                    }
                }
            }
        }

        self.metrics
            .tasks_dead_lettered
            .fetch_add(1, Ordering::Relaxed);
        tracing::error!(
            task_id = %self.task_id,
            event = %self.event_name,
            error = %last_error,
            "Task exhausted retries; dead-lettered"
        );
        self.dead_letters.insert(
            self.task_id.clone(),
            DeadLetter {
                task_id: self.task_id,
                event_name: self.event_name,
                payload: self.payload,
                error: last_error.to_string(),
                attempts: self.config.max_attempts,
                failed_at: chrono::Utc::now(),
            },
        );
    }
}

fn backoff_for(config: &DispatcherConfig, attempt: u32) -> Duration {
    let exp = config
        .base_delay
        .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
    let capped = exp.min(config.max_delay);

    // Up to 25% jitter keeps simultaneous retries from stampeding.
    let jitter = rand::rng().random_range(0.0..0.25);
    capped.mul_f64(1.0 + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn handler_failing_first<const FAILURES: u32>(
        calls: Arc<AtomicU32>,
    ) -> impl Fn(TaskEvent, StepRunner) -> TaskFuture + Send + Sync + 'static {
        move |_event, _steps| {
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < FAILURES {
                    Err(DispatchError::handler("transient"))
                } else {
                    Ok(serde_json::json!({ "ok": true }))
                }
            })
        }
    }

    async fn wait_until(deadline_ms: u64, mut check: impl FnMut() -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(deadline_ms);
        while tokio::time::Instant::now() < deadline {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        check()
    }

    #[tokio::test]
    async fn send_rejects_unknown_events() {
        let dispatcher = InProcessDispatcher::new(DispatcherConfig::development());
        let err = dispatcher
            .send("telemetry/unknown", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnknownEvent(_)));
    }

    #[tokio::test]
    async fn task_retries_until_success() {
        let dispatcher = InProcessDispatcher::new(DispatcherConfig::development());
        let calls = Arc::new(AtomicU32::new(0));
        dispatcher.register("telemetry/test", handler_failing_first::<2>(Arc::clone(&calls)));

        let receipt = dispatcher
            .send("telemetry/test", serde_json::json!({ "n": 1 }))
            .await
            .unwrap();
        assert_eq!(receipt.task_ids.len(), 1);

        let metrics = dispatcher.metrics();
        assert!(
            wait_until(2_000, || metrics.snapshot().tasks_succeeded == 1).await,
            "task never succeeded: {:?}",
            metrics.snapshot()
        );

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_dispatched, 1);
        assert_eq!(snapshot.attempts_retried, 2);
        assert_eq!(snapshot.tasks_dead_lettered, 0);
        assert!(dispatcher.dead_letters().is_empty());
    }

    #[tokio::test]
    async fn exhausted_task_is_dead_lettered() {
        let dispatcher = InProcessDispatcher::new(DispatcherConfig::development());
        dispatcher.register("telemetry/doomed", |_event, _steps| {
            Box::pin(async { Err(DispatchError::handler("permanent")) })
        });

        dispatcher
            .send("telemetry/doomed", serde_json::json!({ "n": 2 }))
            .await
            .unwrap();

        let metrics = dispatcher.metrics();
        assert!(
            wait_until(2_000, || metrics.snapshot().tasks_dead_lettered == 1).await,
            "task never dead-lettered: {:?}",
            metrics.snapshot()
        );

        let letters = dispatcher.dead_letters();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].event_name, "telemetry/doomed");
        assert_eq!(letters[0].attempts, 3);
        assert!(letters[0].error.contains("permanent"));
    }

    #[tokio::test]
    async fn completed_steps_survive_retries() {
        let dispatcher = InProcessDispatcher::new(DispatcherConfig::development());
        let step_calls = Arc::new(AtomicU32::new(0));
        let attempts = Arc::new(AtomicU32::new(0));

        let step_calls_h = Arc::clone(&step_calls);
        let attempts_h = Arc::clone(&attempts);
        dispatcher.register("telemetry/stepped", move |_event, steps| {
            let step_calls = Arc::clone(&step_calls_h);
            let attempts = Arc::clone(&attempts_h);
            Box::pin(async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);

                let _: i64 = steps
                    .run("persist", || async {
                        step_calls.fetch_add(1, Ordering::SeqCst);
                        Ok(11)
                    })
                    .await?;

                // Fail after the step on the first attempt only.
                if attempt == 0 {
                    return Err(DispatchError::handler("post-step crash"));
                }
                Ok(serde_json::json!({}))
            })
        });

        dispatcher
            .send("telemetry/stepped", serde_json::json!({}))
            .await
            .unwrap();

        let metrics = dispatcher.metrics();
        assert!(wait_until(2_000, || metrics.snapshot().tasks_succeeded == 1).await);
        assert_eq!(step_calls.load(Ordering::SeqCst), 1, "step re-ran on retry");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn shutdown_rejects_new_sends() {
        let dispatcher = InProcessDispatcher::new(DispatcherConfig::development());
        dispatcher.register("telemetry/test", |_e, _s| {
            Box::pin(async { Ok(serde_json::json!({})) })
        });

        dispatcher.shutdown();
        let err = dispatcher
            .send("telemetry/test", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::ShuttingDown));
    }
}
