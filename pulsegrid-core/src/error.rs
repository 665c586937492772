//! Error types for pulsegrid-core.

use thiserror::Error;

/// Errors produced by the pure transforms.
///
/// The transformer assumes its input already passed validation, so the only
/// failure it can surface is an identity that cannot be keyed numerically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Device id is not a numeric IMEI-style key.
    #[error("device id '{0}' is not a numeric IMEI")]
    InvalidDeviceId(String),
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
