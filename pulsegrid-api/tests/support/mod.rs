//! Shared test harness: a full router wired to in-memory collaborators.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::RwLock;
use tower::ServiceExt;

use pulsegrid_api::constants::EVENT_PAYLOAD_RECEIVED;
use pulsegrid_api::jobs::normalizer;
use pulsegrid_api::{
    create_api_router, ApiConfig, AppState, AuthConfig, AuthMiddlewareState, ErrorNotifier,
    ValidationNotification,
};
use pulsegrid_dispatch::TaskDispatcher;
use pulsegrid_storage::TelemetryStore;
use pulsegrid_test_utils::{InlineTaskDispatcher, InMemoryTelemetryStore, TEST_API_KEY};

// ============================================================================
// CAPTURE NOTIFIER
// ============================================================================

/// Notifier double that records every notification.
#[derive(Default)]
pub struct CaptureNotifier {
    notifications: RwLock<Vec<ValidationNotification>>,
}

impl CaptureNotifier {
    pub async fn captured(&self) -> Vec<ValidationNotification> {
        self.notifications.read().await.clone()
    }

    /// Wait until at least `count` notifications arrived (they are delivered
    /// from a spawned task) or the deadline passes.
    pub async fn wait_for(&self, count: usize) -> Vec<ValidationNotification> {
        for _ in 0..200 {
            let captured = self.captured().await;
            if captured.len() >= count {
                return captured;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        self.captured().await
    }
}

#[async_trait]
impl ErrorNotifier for CaptureNotifier {
    async fn notify(&self, notification: &ValidationNotification) {
        self.notifications.write().await.push(notification.clone());
    }
}

// ============================================================================
// TEST CONTEXT
// ============================================================================

/// A full API router plus handles to its in-memory collaborators.
pub struct TestContext {
    pub store: Arc<InMemoryTelemetryStore>,
    pub dispatcher: Arc<InlineTaskDispatcher>,
    pub notifier: Arc<CaptureNotifier>,
    pub router: Router,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(ApiConfig::default())
    }

    pub fn with_config(config: ApiConfig) -> Self {
        let store = Arc::new(InMemoryTelemetryStore::new());
        let dispatcher = Arc::new(InlineTaskDispatcher::new());
        let notifier = Arc::new(CaptureNotifier::default());

        let job_store: Arc<dyn TelemetryStore> = store.clone();
        dispatcher.register(EVENT_PAYLOAD_RECEIVED, move |event, steps| {
            let store = Arc::clone(&job_store);
            Box::pin(normalizer::normalize_payload(event, steps, store))
        });

        let state = AppState::new(
            store.clone() as Arc<dyn TelemetryStore>,
            dispatcher.clone() as Arc<dyn TaskDispatcher>,
            notifier.clone() as Arc<dyn ErrorNotifier>,
            config.clone(),
        );
        let auth_state = AuthMiddlewareState::new(AuthConfig::new(TEST_API_KEY));
        let router = create_api_router(state, auth_state, &config);

        Self {
            store,
            dispatcher,
            notifier,
            router,
        }
    }
}

// ============================================================================
// REQUEST HELPERS
// ============================================================================

/// Run a request through the router and decode the JSON body (Null when the
/// body is empty or not JSON).
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.expect("infallible");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// POST a document to the ingest endpoint.
pub async fn post_ingest(
    router: &Router,
    api_key: Option<&str>,
    body: Vec<u8>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/ingest/pulsetrak")
        .header("content-type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    let request = builder.body(Body::from(body)).expect("request");
    send(router, request).await
}

/// POST a JSON document to the ingest endpoint.
pub async fn post_ingest_json(
    router: &Router,
    api_key: Option<&str>,
    document: &Value,
) -> (StatusCode, Value) {
    post_ingest(
        router,
        api_key,
        serde_json::to_vec(document).expect("serialize"),
    )
    .await
}

/// GET a path with an optional API key.
pub async fn get(router: &Router, uri: &str, api_key: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    let request = builder.body(Body::empty()).expect("request");
    send(router, request).await
}
