//! Error Notification Sink
//!
//! Best-effort delivery of validation failures to an external collaborator.
//! Deliveries are HMAC-SHA256 signed and fire-and-forget: a failed or
//! unconfigured sink is logged and never affects the webhook response.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use pulsegrid_core::FieldError;

use crate::constants::DEFAULT_NOTIFY_TIMEOUT_SECS;

// ============================================================================
// NOTIFICATION TYPES
// ============================================================================

/// Notification emitted for a payload that failed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationNotification {
    /// Audit record id, when the audit write succeeded.
    pub payload_id: Option<i64>,
    pub device_id: Option<String>,
    /// Raw device timestamp as received, unit-ambiguous.
    pub timestamp: Option<f64>,
    pub error_type: String,
    pub errors: Vec<FieldError>,
    pub retryable: bool,
    pub received_at: DateTime<Utc>,
}

/// Best-effort sink for validation-category errors.
#[async_trait]
pub trait ErrorNotifier: Send + Sync {
    async fn notify(&self, notification: &ValidationNotification);
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Notification sink configuration.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Target URL; `None` disables the sink entirely.
    pub endpoint: Option<String>,
    /// Secret for HMAC payload signatures.
    pub secret: String,
    /// Delivery timeout.
    pub timeout: Duration,
}

impl NotifierConfig {
    /// Create a NotifierConfig from environment variables.
    ///
    /// Environment variables:
    /// - `PULSEGRID_NOTIFY_URL`: Sink endpoint (unset = disabled)
    /// - `PULSEGRID_NOTIFY_SECRET`: HMAC signing secret (default: empty)
    /// - `PULSEGRID_NOTIFY_TIMEOUT_SECS`: Delivery timeout (default: 10)
    pub fn from_env() -> Self {
        Self {
            endpoint: std::env::var("PULSEGRID_NOTIFY_URL")
                .ok()
                .filter(|u| !u.trim().is_empty()),
            secret: std::env::var("PULSEGRID_NOTIFY_SECRET").unwrap_or_default(),
            timeout: Duration::from_secs(
                std::env::var("PULSEGRID_NOTIFY_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_NOTIFY_TIMEOUT_SECS),
            ),
        }
    }
}

// ============================================================================
// WEBHOOK SINK
// ============================================================================

/// HTTP implementation of the notification sink.
pub struct WebhookNotifier {
    endpoint: Option<String>,
    secret: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(config: NotifierConfig) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

        Ok(Self {
            endpoint: config.endpoint,
            secret: config.secret,
            client,
        })
    }
}

/// Generate an HMAC-SHA256 signature for a notification body.
fn sign_payload(payload: &[u8], secret: &str) -> Result<String, String> {
    type HmacSha256 = Hmac<Sha256>;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| format!("Failed to initialize HMAC: {e}"))?;
    mac.update(payload);
    let result = mac.finalize();

    Ok(hex::encode(result.into_bytes()))
}

#[async_trait]
impl ErrorNotifier for WebhookNotifier {
    async fn notify(&self, notification: &ValidationNotification) {
        let Some(endpoint) = self.endpoint.as_deref() else {
            tracing::debug!("Notification sink not configured; dropping notification");
            return;
        };

        let body = match serde_json::to_vec(notification) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize notification");
                return;
            }
        };

        let signature = match sign_payload(&body, &self.secret) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!(error = %e, "Failed to sign notification");
                return;
            }
        };

        let result = self
            .client
            .post(endpoint)
            .header("Content-Type", "application/json")
            .header("X-Webhook-Signature", format!("sha256={signature}"))
            .body(body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(
                    payload_id = ?notification.payload_id,
                    "Validation notification delivered"
                );
            }
            Ok(response) => {
                tracing::warn!(
                    status = %response.status(),
                    payload_id = ?notification.payload_id,
                    "Notification sink rejected delivery"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    payload_id = ?notification.payload_id,
                    "Notification delivery failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_hex_encoded_hmac() {
        let sig = sign_payload(b"{}", "secret").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));

        // Stable for identical inputs, different for different secrets.
        assert_eq!(sig, sign_payload(b"{}", "secret").unwrap());
        assert_ne!(sig, sign_payload(b"{}", "other").unwrap());
    }

    #[tokio::test]
    async fn unconfigured_sink_is_a_noop() {
        let notifier = WebhookNotifier::new(NotifierConfig {
            endpoint: None,
            secret: String::new(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();

        // Must not panic or block.
        notifier
            .notify(&ValidationNotification {
                payload_id: None,
                device_id: None,
                timestamp: None,
                error_type: "validation".to_string(),
                errors: vec![],
                retryable: false,
                received_at: Utc::now(),
            })
            .await;
    }
}
