//! Request/response types for the pulsegrid API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pulsegrid_core::DeviceLatestState;

// ============================================================================
// RESPONSE ENVELOPE
// ============================================================================

/// Success envelope: `{success, message?, data, timestamp}`.
///
/// The error half of the envelope is produced by
/// [`crate::error::ApiError`]'s IntoResponse implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    /// Wrap response data in a success envelope.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
            timestamp: Utc::now(),
        }
    }

    /// Wrap response data with a human-readable message.
    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data,
            timestamp: Utc::now(),
        }
    }
}

// ============================================================================
// INGEST
// ============================================================================

/// Data payload of a successful ingest response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct IngestAccepted {
    /// Audit record id for the stored raw payload.
    pub payload_id: i64,
    pub device_id: String,
    /// Device timestamp normalized to epoch milliseconds.
    pub recorded_at: i64,
    /// Whether the payload's values fell outside safe operating ranges.
    pub critical: bool,
}

// ============================================================================
// DASHBOARD
// ============================================================================

/// Query parameters for the device list.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct ListDevicesQuery {
    /// Maximum rows to return; capped server-side.
    pub limit: Option<i64>,
}

/// Data payload of the device list response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeviceListData {
    pub devices: Vec<DeviceLatestState>,
    pub total: usize,
}
