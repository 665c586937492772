//! Shared application state for Axum routers.

use std::sync::Arc;

use pulsegrid_core::{OperatingRanges, ValidatorConfig};
use pulsegrid_dispatch::TaskDispatcher;
use pulsegrid_storage::TelemetryStore;

use crate::config::ApiConfig;
use crate::notify::ErrorNotifier;

/// Application-wide state shared across all routes.
///
/// The store wraps the process-wide connection pool; it is constructed once
/// at startup and cloned (cheaply, behind Arcs) into every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TelemetryStore>,
    pub dispatcher: Arc<dyn TaskDispatcher>,
    pub notifier: Arc<dyn ErrorNotifier>,
    pub validator_config: Arc<ValidatorConfig>,
    pub operating_ranges: Arc<OperatingRanges>,
    pub config: Arc<ApiConfig>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        store: Arc<dyn TelemetryStore>,
        dispatcher: Arc<dyn TaskDispatcher>,
        notifier: Arc<dyn ErrorNotifier>,
        config: ApiConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            notifier,
            validator_config: Arc::new(ValidatorConfig::from_env()),
            operating_ranges: Arc::new(OperatingRanges::default()),
            config: Arc::new(config),
            start_time: std::time::Instant::now(),
        }
    }

    /// Override the validator configuration (used by tests).
    pub fn with_validator_config(mut self, validator_config: ValidatorConfig) -> Self {
        self.validator_config = Arc::new(validator_config);
        self
    }
}
