//! Webhook Ingestion Route (hot path)
//!
//! One POST endpoint drives the per-request state machine:
//! Received -> Authenticated -> SizeChecked -> Parsed -> Validated ->
//! AuditStored -> (LatestStateUpdated) -> Dispatched -> Acknowledged.
//!
//! Authentication runs in middleware; everything after the audit write is a
//! freshness optimization, not a correctness requirement. The only two
//! fatal failure points past validation are the audit write and the task
//! dispatch - losing either would lose the event, so both answer 503 and
//! leave the retry to the provider.

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::{json, Value};

use pulsegrid_core::{
    classify, normalize_epoch_ms, to_location_reading, to_sensor_reading, validate,
    LatestStateUpdate, PayloadStatus, TrackerPayload,
};

use crate::constants::EVENT_PAYLOAD_RECEIVED;
use crate::error::{ApiError, ApiResult};
use crate::notify::ValidationNotification;
use crate::state::AppState;
use crate::types::{ApiResponse, IngestAccepted};

/// POST /api/v1/ingest/pulsetrak - Ingest one telemetry payload
#[utoipa::path(
    post,
    path = "/api/v1/ingest/pulsetrak",
    tag = "Ingest",
    responses(
        (status = 200, description = "Payload accepted", body = ApiResponse<IngestAccepted>),
        (status = 400, description = "Malformed JSON or validation failure", body = ApiError),
        (status = 401, description = "Missing or invalid API key", body = ApiError),
        (status = 413, description = "Body exceeds the size limit", body = ApiError),
        (status = 503, description = "Audit storage or dispatch unavailable", body = ApiError),
    ),
    security(("api_key" = []))
)]
pub async fn ingest_pulsetrak(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    // SizeChecked: reject before parsing.
    if body.len() > state.config.max_body_bytes {
        return Err(ApiError::payload_too_large(state.config.max_body_bytes));
    }

    // Parsed: malformed input gets no audit record.
    let document: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::malformed_input(format!("Invalid JSON: {e}")))?;

    // Validated: from here on, every call produces exactly one audit record
    // (best-effort for invalid payloads, mandatory for valid ones).
    let report = validate(&document, &state.validator_config);
    if !report.valid {
        return Err(reject_invalid(&state, document, report.errors).await);
    }

    // AuditStored: the one write the response cannot survive without.
    let payload_id = match state
        .store
        .insert_raw_payload(&document, PayloadStatus::Pending, None)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(error = %e, "Audit write failed for valid payload");
            return Err(ApiError::storage_unavailable(
                "Failed to persist the payload; please retry",
            ));
        }
    };

    // Validation guarantees these exist on the document.
    let device_id = document
        .get("DeviceId")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let recorded_at = document
        .get("Timestamp")
        .and_then(Value::as_f64)
        .map(normalize_epoch_ms)
        .unwrap_or_default();

    // LatestStateUpdated: best-effort snapshot for dashboard freshness; the
    // normalizer reconciles the projection either way.
    let critical = refresh_latest_state(&state, payload_id, &document).await;

    // Dispatched: without the normalization task the record would silently
    // never be processed, so a dispatch failure is fatal.
    let dispatch_payload = json!({ "payload_id": payload_id, "payload": document });
    match state
        .dispatcher
        .send(EVENT_PAYLOAD_RECEIVED, dispatch_payload)
        .await
    {
        Ok(receipt) => {
            if let Some(task_id) = receipt.task_ids.first() {
                if let Err(e) = state.store.set_raw_payload_task(payload_id, task_id).await {
                    tracing::warn!(payload_id, error = %e, "Failed to record dispatch task id");
                }
            }
        }
        Err(e) => {
            tracing::error!(payload_id, error = %e, "Failed to dispatch normalization task");
            if let Err(me) = state
                .store
                .mark_raw_payload_failed(payload_id, &format!("dispatch failed: {e}"))
                .await
            {
                tracing::error!(payload_id, error = %me, "Failed to mark audit record failed");
            }
            return Err(ApiError::dispatch_unavailable(
                "Failed to schedule payload normalization; please retry",
            ));
        }
    }

    tracing::info!(payload_id, device_id = %device_id, recorded_at, "Telemetry accepted");

    Ok((
        StatusCode::OK,
        Json(ApiResponse::ok_with_message(
            IngestAccepted {
                payload_id,
                device_id,
                recorded_at,
                critical,
            },
            "Telemetry accepted",
        )),
    ))
}

/// Audit + notify + build the 400 for a payload that failed validation.
///
/// The audit write is best-effort here: the payload is already known-bad,
/// so losing the audit row degrades forensics, not correctness.
async fn reject_invalid(
    state: &AppState,
    document: Value,
    errors: Vec<pulsegrid_core::FieldError>,
) -> ApiError {
    let payload_id = match state
        .store
        .insert_raw_payload(&document, PayloadStatus::Failed, Some(&errors))
        .await
    {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::error!(error = %e, "Failed to audit invalid payload");
            None
        }
    };

    let notification = ValidationNotification {
        payload_id,
        device_id: document
            .get("DeviceId")
            .and_then(Value::as_str)
            .map(str::to_string),
        timestamp: document.get("Timestamp").and_then(Value::as_f64),
        error_type: "validation".to_string(),
        errors: errors.clone(),
        retryable: false,
        received_at: Utc::now(),
    };
    let notifier = state.notifier.clone();
    tokio::spawn(async move {
        notifier.notify(&notification).await;
    });

    let mut details = json!({ "errors": errors });
    if let Some(id) = payload_id {
        details["payload_id"] = json!(id);
    }

    ApiError::validation_failed("Payload validation failed").with_details(details)
}

/// Transform, classify, and upsert the latest-state snapshot.
///
/// Returns the critical flag for the response. Every failure in here is
/// logged and swallowed: the cold path retries transformation independently
/// and the projection converges on the next cycle.
async fn refresh_latest_state(state: &AppState, payload_id: i64, document: &Value) -> bool {
    let payload: TrackerPayload = match serde_json::from_value(document.clone()) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(payload_id, error = %e, "Typed parse failed; deferring to normalizer");
            return false;
        }
    };

    let classification = classify(&payload, &state.operating_ranges);
    if classification.is_critical {
        tracing::warn!(
            payload_id,
            device_id = %payload.device_id,
            reasons = ?classification.reasons,
            "Critical telemetry event"
        );
    }

    match (to_sensor_reading(&payload), to_location_reading(&payload)) {
        (Ok(sensor), Ok(location)) => {
            let update = LatestStateUpdate::from_readings(&payload.device_name, &sensor, &location);
            if let Err(e) = state.store.upsert_latest_state(&update).await {
                tracing::warn!(
                    payload_id,
                    device_imei = update.device_imei,
                    error = %e,
                    "Latest-state snapshot update failed; cold path will reconcile"
                );
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(payload_id, error = %e, "Hot-path transform failed; deferring to normalizer");
        }
    }

    classification.is_critical
}
