//! Shared-secret authentication middleware.
//!
//! Runs ahead of the ingest and dashboard handlers. A request that fails
//! here is answered with a 401 envelope and never touches storage: no audit
//! record is written for unauthenticated calls.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::auth::{extract_api_key, AuthConfig};
use crate::error::ApiError;

/// Shared state for the authentication middleware.
#[derive(Debug, Clone)]
pub struct AuthMiddlewareState {
    pub auth_config: Arc<AuthConfig>,
}

impl AuthMiddlewareState {
    pub fn new(auth_config: AuthConfig) -> Self {
        Self {
            auth_config: Arc::new(auth_config),
        }
    }
}

/// Validate the request's API key before the handler runs.
pub async fn api_key_middleware(
    State(state): State<AuthMiddlewareState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let candidate = extract_api_key(request.headers()).ok_or_else(|| {
        ApiError::unauthorized("Authentication required: provide X-Api-Key or a Bearer token")
    })?;

    if !state.auth_config.is_valid_key(candidate) {
        return Err(ApiError::unauthorized("Invalid API key"));
    }

    Ok(next.run(request).await)
}
