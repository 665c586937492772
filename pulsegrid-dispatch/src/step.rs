//! Per-step idempotency for retried tasks.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{DispatchError, DispatchResult};

/// Step memoization shared across retries of one task.
///
/// `run` executes a named step at most once per task: on a retry, steps
/// that already completed return their recorded result without re-running.
/// Results round-trip through JSON so the memo stays handler-agnostic.
///
/// The memo lives in process memory; a redelivery that starts from a fresh
/// `StepRunner` (new task, or process restart) re-runs every step, which is
/// why each step must itself be safely re-runnable.
#[derive(Clone, Default)]
pub struct StepRunner {
    completed: Arc<DashMap<String, Value>>,
}

impl StepRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of steps recorded as complete.
    pub fn completed_steps(&self) -> usize {
        self.completed.len()
    }

    /// Run `step` unless it already completed in a prior attempt.
    pub async fn run<T, F, Fut>(&self, name: &str, step: F) -> DispatchResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = DispatchResult<T>>,
    {
        if let Some(recorded) = self.completed.get(name) {
            return serde_json::from_value(recorded.clone()).map_err(|e| {
                DispatchError::Serialization(format!("replaying step '{name}': {e}"))
            });
        }

        let result = step().await?;
        let recorded = serde_json::to_value(&result)
            .map_err(|e| DispatchError::Serialization(format!("recording step '{name}': {e}")))?;
        self.completed.insert(name.to_string(), recorded);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn step_runs_once_across_retries() {
        let runner = StepRunner::new();
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let result: i64 = runner
                .run("persist", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await
                .unwrap();
            assert_eq!(result, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(runner.completed_steps(), 1);
    }

    #[tokio::test]
    async fn failed_step_is_not_recorded() {
        let runner = StepRunner::new();
        let calls = AtomicU32::new(0);

        let first: DispatchResult<i64> = runner
            .run("flaky", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DispatchError::handler("boom"))
            })
            .await;
        assert!(first.is_err());
        assert_eq!(runner.completed_steps(), 0);

        let second: i64 = runner
            .run("flaky", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            })
            .await
            .unwrap();
        assert_eq!(second, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn distinct_steps_do_not_share_results() {
        let runner = StepRunner::new();

        let a: i64 = runner.run("a", || async { Ok(1) }).await.unwrap();
        let b: i64 = runner.run("b", || async { Ok(2) }).await.unwrap();

        assert_eq!((a, b), (1, 2));
        assert_eq!(runner.completed_steps(), 2);
    }
}
