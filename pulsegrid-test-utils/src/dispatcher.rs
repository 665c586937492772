//! Inline task dispatcher for deterministic tests.
//!
//! Runs registered handlers synchronously inside `send`, retrying without
//! backoff up to a small attempt cap. Tests observe cold-path effects
//! immediately after the webhook call returns instead of polling.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use pulsegrid_dispatch::{
    DeadLetter, DispatchError, DispatchReceipt, DispatchResult, StepRunner, TaskDispatcher,
    TaskEvent, TaskFuture, TaskHandler,
};

/// Dispatcher that executes tasks inline within `send`.
pub struct InlineTaskDispatcher {
    handlers: DashMap<String, TaskHandler>,
    sent: RwLock<Vec<(String, Value)>>,
    dead_letters: RwLock<Vec<DeadLetter>>,
    fail_sends: AtomicBool,
    max_attempts: u32,
}

impl Default for InlineTaskDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl InlineTaskDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
            sent: RwLock::new(Vec::new()),
            dead_letters: RwLock::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            max_attempts: 3,
        }
    }

    /// Register the handler for an event name, replacing any previous one.
    pub fn register<F>(&self, event_name: &str, handler: F)
    where
        F: Fn(TaskEvent, StepRunner) -> TaskFuture + Send + Sync + 'static,
    {
        self.handlers
            .insert(event_name.to_string(), std::sync::Arc::new(handler));
    }

    /// Make subsequent `send` calls fail outright.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Events accepted by `send`, in order.
    pub async fn sent_events(&self) -> Vec<(String, Value)> {
        self.sent.read().await.clone()
    }

    /// Tasks whose inline retries were exhausted.
    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.read().await.clone()
    }
}

#[async_trait]
impl TaskDispatcher for InlineTaskDispatcher {
    async fn send(&self, event_name: &str, payload: Value) -> DispatchResult<DispatchReceipt> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(DispatchError::Rejected("injected dispatch failure".to_string()));
        }

        let handler = self
            .handlers
            .get(event_name)
            .map(|h| h.value().clone())
            .ok_or_else(|| DispatchError::UnknownEvent(event_name.to_string()))?;

        let task_id = Uuid::now_v7().to_string();
        self.sent
            .write()
            .await
            .push((event_name.to_string(), payload.clone()));

        // Inline at-least-once execution: send has accepted the task, so an
        // exhausted handler dead-letters rather than failing the send.
        let steps = StepRunner::new();
        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            let event = TaskEvent {
                id: task_id.clone(),
                name: event_name.to_string(),
                payload: payload.clone(),
                attempt,
            };
            match handler(event, steps.clone()).await {
                Ok(_) => {
                    last_error = None;
                    break;
                }
                Err(e) => last_error = Some(e),
            }
        }

        if let Some(error) = last_error {
            self.dead_letters.write().await.push(DeadLetter {
                task_id: task_id.clone(),
                event_name: event_name.to_string(),
                payload,
                error: error.to_string(),
                attempts: self.max_attempts,
                failed_at: chrono::Utc::now(),
            });
        }

        Ok(DispatchReceipt {
            task_ids: vec![task_id],
        })
    }
}
