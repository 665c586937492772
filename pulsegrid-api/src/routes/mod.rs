//! REST API Routes Module
//!
//! Route handlers and router assembly:
//! - Webhook ingestion (the hot path)
//! - Device dashboard list
//! - Health check endpoints (Kubernetes-compatible)
//! - CORS support for browser-based dashboard clients

pub mod devices;
pub mod health;
pub mod ingest;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::middleware::{api_key_middleware, AuthMiddlewareState};
use crate::state::AppState;

/// Assemble the full API router.
///
/// The ingest and dashboard routes sit behind the shared-secret middleware;
/// health endpoints stay open for orchestration probes.
pub fn create_api_router(
    state: AppState,
    auth_state: AuthMiddlewareState,
    api_config: &ApiConfig,
) -> Router {
    let protected = Router::new()
        .route("/api/v1/ingest/pulsetrak", post(ingest::ingest_pulsetrak))
        .route("/api/v1/devices", get(devices::list_devices))
        .layer(from_fn_with_state(auth_state, api_key_middleware))
        .with_state(state.clone());

    Router::new()
        .merge(protected)
        .merge(health::create_router(state))
        .layer(cors_layer(api_config))
        .layer(TraceLayer::new_for_http())
        // Hard transport backstop; the enveloped 413 fires first because the
        // handler checks the configured limit on the buffered body.
        .layer(DefaultBodyLimit::max(
            api_config.max_body_bytes.saturating_mul(2),
        ))
}

fn cors_layer(api_config: &ApiConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static("x-api-key"),
        ]);

    if api_config.cors_origins.is_empty() {
        // Dev mode: allow all origins.
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = api_config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer.allow_origin(origins)
    }
}
