//! API Configuration Module
//!
//! Configuration for the HTTP surface: body-size limit, dashboard paging,
//! and CORS. Loaded from environment variables with development defaults.

use crate::constants::{DEFAULT_DEVICE_LIST_LIMIT, DEFAULT_MAX_BODY_BYTES};

/// API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Maximum accepted webhook body size in bytes; larger bodies get 413
    /// before parsing.
    pub max_body_bytes: usize,

    /// Default row limit for the device dashboard list.
    pub device_list_limit: i64,

    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            device_list_limit: DEFAULT_DEVICE_LIST_LIMIT,
            cors_origins: Vec::new(),
        }
    }
}

impl ApiConfig {
    /// Create an ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `PULSEGRID_MAX_BODY_BYTES`: Webhook body size limit (default: 1048576)
    /// - `PULSEGRID_DEVICE_LIST_LIMIT`: Default dashboard row limit (default: 50)
    /// - `PULSEGRID_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_body_bytes = std::env::var("PULSEGRID_MAX_BODY_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_body_bytes);

        let device_list_limit = std::env::var("PULSEGRID_DEVICE_LIST_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.device_list_limit);

        let cors_origins = std::env::var("PULSEGRID_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            max_body_bytes,
            device_list_limit,
            cors_origins,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.max_body_bytes, 1_048_576);
        assert_eq!(config.device_list_limit, 50);
        assert!(config.cors_origins.is_empty());
    }
}
