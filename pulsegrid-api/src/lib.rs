//! Pulsegrid API - Webhook Ingestion and Dashboard Layer
//!
//! This crate owns the HTTP surface of the pipeline: the provider webhook
//! endpoint (the hot path), the async normalizer job (the cold path), the
//! dashboard read API, and process bootstrap. Persistence lives in
//! `pulsegrid-storage`; task delivery semantics live in
//! `pulsegrid-dispatch`.

pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod jobs;
pub mod middleware;
pub mod notify;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod routes;
pub mod state;
pub mod types;

// Re-export commonly used types
pub use auth::{extract_api_key, AuthConfig};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{api_key_middleware, AuthMiddlewareState};
pub use notify::{ErrorNotifier, NotifierConfig, ValidationNotification, WebhookNotifier};
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use state::AppState;
pub use types::{ApiResponse, DeviceListData, IngestAccepted, ListDevicesQuery};
