//! Async Normalizer (cold path)
//!
//! The retryable, resumable job behind `telemetry/payload.received`. Each
//! step runs through the dispatcher's [`StepRunner`], so a retried task
//! skips whatever already completed. Steps 1-3 (transform, transform,
//! persist) must succeed for the job to succeed; steps 4-5 (latest-state
//! refs, audit bookkeeping) are best-effort and never fail the task.
//!
//! Because the reading tables are append-only with no uniqueness
//! constraint, a redelivered task re-inserts its rows; the pipeline trades
//! duplicate history rows for at-least-once durability.

use std::sync::Arc;

use serde_json::{json, Value};

use pulsegrid_core::{
    to_location_reading, to_sensor_reading, NewLocationReading, NewSensorReading, TrackerPayload,
};
use pulsegrid_dispatch::{
    DispatchError, DispatchResult, InProcessDispatcher, StepRunner, TaskEvent,
};
use pulsegrid_storage::TelemetryStore;

use crate::constants::EVENT_PAYLOAD_RECEIVED;

/// Register the normalizer on the dispatcher.
pub fn register(dispatcher: &InProcessDispatcher, store: Arc<dyn TelemetryStore>) {
    dispatcher.register(EVENT_PAYLOAD_RECEIVED, move |event, steps| {
        let store = Arc::clone(&store);
        Box::pin(async move { normalize_payload(event, steps, store).await })
    });
}

/// Run the normalization steps for one dispatched payload.
///
/// Returns a `{device_id, recorded_at}` summary once persistence succeeded;
/// earlier-step failures propagate and trigger the dispatcher's retry.
pub async fn normalize_payload(
    event: TaskEvent,
    steps: StepRunner,
    store: Arc<dyn TelemetryStore>,
) -> DispatchResult<Value> {
    let payload_id = event
        .payload
        .get("payload_id")
        .and_then(Value::as_i64)
        .ok_or_else(|| DispatchError::handler("event is missing payload_id"))?;
    let document = event
        .payload
        .get("payload")
        .cloned()
        .ok_or_else(|| DispatchError::handler("event is missing the payload document"))?;

    tracing::debug!(payload_id, attempt = event.attempt, "Normalizing payload");

    // Step 1: sensor transform (pure).
    let sensor: NewSensorReading = steps
        .run("transform-sensor", || async {
            let payload: TrackerPayload =
                serde_json::from_value(document.clone()).map_err(DispatchError::handler)?;
            to_sensor_reading(&payload).map_err(DispatchError::handler)
        })
        .await?;

    // Step 2: location transform (pure).
    let location: NewLocationReading = steps
        .run("transform-location", || async {
            let payload: TrackerPayload =
                serde_json::from_value(document.clone()).map_err(DispatchError::handler)?;
            to_location_reading(&payload).map_err(DispatchError::handler)
        })
        .await?;

    // Step 3: persist both rows. Memoized, so a retry of a later failure
    // does not duplicate within this task; a full redelivery would.
    let (sensor_id, location_id): (i64, i64) = steps
        .run("persist-readings", || async {
            let sensor_id = store
                .insert_sensor_reading(&sensor)
                .await
                .map_err(DispatchError::handler)?;
            let location_id = store
                .insert_location_reading(&location)
                .await
                .map_err(DispatchError::handler)?;
            Ok((sensor_id, location_id))
        })
        .await?;

    // Step 4: point the projection at the new rows. May race a later
    // webhook's snapshot for the same device; last completion wins.
    let refs: DispatchResult<()> = steps
        .run("update-latest-refs", || async {
            store
                .attach_latest_refs(sensor.device_imei, sensor_id, location_id)
                .await
                .map_err(DispatchError::handler)
        })
        .await;
    if let Err(e) = refs {
        tracing::warn!(
            payload_id,
            device_imei = sensor.device_imei,
            error = %e,
            "Latest-state ref update failed; snapshot remains authoritative"
        );
    }

    // Step 5: audit bookkeeping. The data is already durable; stale status
    // is not worth failing the task over.
    let marked: DispatchResult<()> = steps
        .run("mark-completed", || async {
            store
                .mark_raw_payload_completed(payload_id)
                .await
                .map_err(DispatchError::handler)
        })
        .await;
    if let Err(e) = marked {
        tracing::warn!(payload_id, error = %e, "Failed to mark audit record completed");
    }

    tracing::info!(
        payload_id,
        device_id = %sensor.device_id,
        sensor_id,
        location_id,
        "Payload normalized"
    );

    Ok(json!({
        "device_id": sensor.device_id,
        "recorded_at": sensor.recorded_at,
    }))
}
