//! Pulsegrid API Server Entry Point
//!
//! Bootstraps logging and configuration, builds the process-wide connection
//! pool, ensures the schema, wires the normalizer onto the dispatcher, and
//! starts the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use pulsegrid_api::{
    create_api_router, jobs, ApiConfig, ApiError, ApiResult, AppState, AuthConfig,
    AuthMiddlewareState, NotifierConfig, WebhookNotifier,
};
use pulsegrid_dispatch::{DispatcherConfig, InProcessDispatcher, TaskDispatcher};
use pulsegrid_storage::{ensure_schema, DbConfig, PgTelemetryStore, TelemetryStore};

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing();

    let db_config = DbConfig::from_env();
    let pool = db_config.create_pool()?;
    ensure_schema(&pool).await?;
    let store: Arc<dyn TelemetryStore> = Arc::new(PgTelemetryStore::new(pool));

    let dispatcher = Arc::new(InProcessDispatcher::new(DispatcherConfig::from_env()));
    jobs::normalizer::register(&dispatcher, Arc::clone(&store));

    let notifier = WebhookNotifier::new(NotifierConfig::from_env())
        .map_err(ApiError::internal_error)?;

    let api_config = ApiConfig::from_env();
    let auth_state = AuthMiddlewareState::new(AuthConfig::from_env());
    let state = AppState::new(
        store,
        Arc::clone(&dispatcher) as Arc<dyn TaskDispatcher>,
        Arc::new(notifier),
        api_config.clone(),
    );

    let app: Router = create_api_router(state, auth_state, &api_config);

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting pulsegrid API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {addr}: {e}")))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {e}")))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    dispatcher.shutdown();
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pulsegrid=info,tower_http=info"));

    if std::env::var("PULSEGRID_LOG_JSON").map(|v| v == "true").unwrap_or(false) {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("PULSEGRID_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("PULSEGRID_API_PORT").ok())
        .unwrap_or_else(|| "3000".to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::internal_error(format!("Invalid port value: {port_str}")))?;

    let addr = format!("{host}:{port}");
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::internal_error(format!("Invalid bind address {addr}: {e}")))
}
