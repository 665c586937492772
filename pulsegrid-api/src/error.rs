//! Error Types for the Pulsegrid API
//!
//! This module defines error handling for the HTTP layer:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation producing the response envelope
//!
//! Every error response carries a stable `error` string, a human-readable
//! `message`, and (for validation failures) a `details.errors` list.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each code maps to exactly one HTTP status code. The serialized
/// SCREAMING_SNAKE_CASE form is the stable `error` string of the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Request lacks a valid API key (401)
    Unauthorized,

    /// Request body exceeded the configured size limit (413)
    PayloadTooLarge,

    /// Request body is not parseable JSON (400)
    MalformedInput,

    /// Payload failed semantic validation (400)
    ValidationFailed,

    /// The audit record could not be durably stored (503)
    StorageUnavailable,

    /// The normalization task could not be scheduled (503)
    DispatchUnavailable,

    /// Unexpected internal error (500)
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::MalformedInput | ErrorCode::ValidationFailed => StatusCode::BAD_REQUEST,
            ErrorCode::StorageUnavailable | ErrorCode::DispatchUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The stable `error` string carried in the response envelope.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorCode::MalformedInput => "MALFORMED_INPUT",
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::StorageUnavailable => "STORAGE_UNAVAILABLE",
            ErrorCode::DispatchUnavailable => "DISPATCH_UNAVAILABLE",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Authentication required",
            ErrorCode::PayloadTooLarge => "Request body too large",
            ErrorCode::MalformedInput => "Request body is not valid JSON",
            ErrorCode::ValidationFailed => "Payload validation failed",
            ErrorCode::StorageUnavailable => "Storage temporarily unavailable",
            ErrorCode::DispatchUnavailable => "Task dispatch temporarily unavailable",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error for API operations.
///
/// Returned by handlers and middleware; rendered as the standard error
/// envelope by its IntoResponse implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (validation field errors, audit id, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors
    // ========================================================================

    /// Create an Unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Create a PayloadTooLarge error.
    pub fn payload_too_large(limit_bytes: usize) -> Self {
        Self::new(
            ErrorCode::PayloadTooLarge,
            format!("Request body exceeds the {limit_bytes} byte limit"),
        )
    }

    /// Create a MalformedInput error.
    pub fn malformed_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MalformedInput, message)
    }

    /// Create a ValidationFailed error.
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    /// Create a StorageUnavailable error.
    pub fn storage_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageUnavailable, message)
    }

    /// Create a DispatchUnavailable error.
    pub fn dispatch_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DispatchUnavailable, message)
    }

    /// Create an InternalError.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

/// Render the error as the standard response envelope:
/// `{success, error, message, details?, timestamp}` with the mapped status.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = serde_json::json!({
            "success": false,
            "error": self.code.as_str(),
            "message": self.message,
            "timestamp": chrono::Utc::now(),
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM COLLABORATOR ERRORS
// ============================================================================

/// Storage failures reaching a handler boundary are retryable 503s; the
/// cause is logged here, never leaked to the caller.
impl From<pulsegrid_storage::StorageError> for ApiError {
    fn from(err: pulsegrid_storage::StorageError) -> Self {
        tracing::error!(error = %err, "Storage error");
        ApiError::storage_unavailable("Storage operation failed")
    }
}

impl From<pulsegrid_dispatch::DispatchError> for ApiError {
    fn from(err: pulsegrid_dispatch::DispatchError) -> Self {
        tracing::error!(error = %err, "Dispatch error");
        ApiError::dispatch_unavailable("Failed to schedule background task")
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::malformed_input(format!("Invalid JSON: {err}"))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_status_mapping() {
        assert_eq!(ErrorCode::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ErrorCode::PayloadTooLarge.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(ErrorCode::MalformedInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::ValidationFailed.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ErrorCode::StorageUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ErrorCode::DispatchUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ErrorCode::InternalError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn stable_error_strings() {
        assert_eq!(ErrorCode::ValidationFailed.as_str(), "VALIDATION_FAILED");
        assert_eq!(ErrorCode::PayloadTooLarge.as_str(), "PAYLOAD_TOO_LARGE");
    }

    #[test]
    fn api_error_constructors() {
        let err = ApiError::unauthorized("Invalid API key");
        assert_eq!(err.code, ErrorCode::Unauthorized);
        assert_eq!(err.message, "Invalid API key");

        let err = ApiError::payload_too_large(1024);
        assert!(err.message.contains("1024"));
    }

    #[test]
    fn api_error_with_details() {
        let details = serde_json::json!({
            "errors": [{ "field": "Location.Latitude", "message": "out of range" }]
        });

        let err = ApiError::validation_failed("Payload validation failed")
            .with_details(details.clone());

        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.details, Some(details));
    }
}
