//! The `TelemetryStore` trait: the storage contract the rest of the system
//! programs against.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use pulsegrid_core::{
    DeviceLatestState, FieldError, LatestStateUpdate, NewLocationReading, NewSensorReading,
    PayloadStatus,
};

use crate::error::StorageResult;

/// One raw audit record as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPayloadRecord {
    pub id: i64,
    pub payload: Value,
    pub source: String,
    pub status: PayloadStatus,
    pub validation_errors: Option<Vec<FieldError>>,
    pub processing_error: Option<String>,
    pub dispatch_task_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Storage contract for the ingestion pipeline.
///
/// Every method is one independent logical write or read; no method spans a
/// transaction across entities. Implementations must be safe for concurrent
/// use by many in-flight requests and normalizer tasks.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Append a raw audit record and return its id.
    ///
    /// Called exactly once per inbound call that reached the validator,
    /// whether or not validation passed.
    async fn insert_raw_payload(
        &self,
        payload: &Value,
        status: PayloadStatus,
        validation_errors: Option<&[FieldError]>,
    ) -> StorageResult<i64>;

    /// Fetch a raw audit record by id.
    async fn get_raw_payload(&self, id: i64) -> StorageResult<Option<RawPayloadRecord>>;

    /// Record the dispatcher task correlation id on an audit record.
    async fn set_raw_payload_task(&self, id: i64, task_id: &str) -> StorageResult<()>;

    /// Transition an audit record to `completed` and stamp `processed_at`.
    async fn mark_raw_payload_completed(&self, id: i64) -> StorageResult<()>;

    /// Transition an audit record to `failed` with a processing error.
    async fn mark_raw_payload_failed(&self, id: i64, error: &str) -> StorageResult<()>;

    /// Append one sensor reading and return its id. Append-only: redelivered
    /// normalizer tasks may insert duplicate rows.
    async fn insert_sensor_reading(&self, reading: &NewSensorReading) -> StorageResult<i64>;

    /// Append one location reading and return its id.
    async fn insert_location_reading(&self, reading: &NewLocationReading) -> StorageResult<i64>;

    /// Upsert the critical-field snapshot for a device.
    ///
    /// Last writer by commit order wins; reading references already attached
    /// by the cold path are left untouched.
    async fn upsert_latest_state(&self, update: &LatestStateUpdate) -> StorageResult<()>;

    /// Point a device's latest-state row at the readings that produced it.
    ///
    /// May race a later webhook's snapshot upsert for the same device; the
    /// refs and the snapshot are allowed to disagree until the next cycle.
    async fn attach_latest_refs(
        &self,
        device_imei: i64,
        sensor_reading_id: i64,
        location_reading_id: i64,
    ) -> StorageResult<()>;

    /// Latest states ordered by most recently updated, up to `limit` rows.
    async fn list_latest_states(&self, limit: i64) -> StorageResult<Vec<DeviceLatestState>>;

    /// Cheap connectivity probe for readiness checks.
    async fn ping(&self) -> StorageResult<()>;
}
