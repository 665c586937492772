//! Constants for the pulsegrid API.

// ============================================================================
// INGESTION
// ============================================================================

/// Default maximum webhook body size in bytes (1 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 1_048_576;

/// Event name the hot path dispatches and the normalizer handles
pub const EVENT_PAYLOAD_RECEIVED: &str = "telemetry/payload.received";

// ============================================================================
// DASHBOARD
// ============================================================================

/// Default row limit for the device list
pub const DEFAULT_DEVICE_LIST_LIMIT: i64 = 50;

/// Hard cap on the device list row limit
pub const MAX_DEVICE_LIST_LIMIT: i64 = 100;

// ============================================================================
// NOTIFICATION
// ============================================================================

/// Default timeout for error-notification delivery in seconds
pub const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 10;
