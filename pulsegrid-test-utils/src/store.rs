//! In-memory `TelemetryStore` for tests.
//!
//! Mirrors the PostgreSQL implementation's semantics (append-only readings,
//! arrival-order last-write-wins upserts, refs that survive snapshot
//! overwrites) without a database. Fault-injection toggles let tests drive
//! the pipeline's failure branches.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;

use pulsegrid_core::{
    DeviceLatestState, FieldError, LatestStateUpdate, NewLocationReading, NewSensorReading,
    PayloadStatus, RAW_SOURCE,
};
use pulsegrid_storage::{RawPayloadRecord, StorageError, StorageResult, TelemetryStore};

#[derive(Default)]
struct Inner {
    raw_payloads: Vec<RawPayloadRecord>,
    sensor_readings: Vec<(i64, NewSensorReading)>,
    location_readings: Vec<(i64, NewLocationReading)>,
    latest_states: HashMap<i64, DeviceLatestState>,
    /// (device_imei, last_recorded_at) per snapshot upsert, in commit order.
    upsert_log: Vec<(i64, i64)>,
    next_raw_id: i64,
    next_reading_id: i64,
}

/// In-memory telemetry store with fault injection.
#[derive(Default)]
pub struct InMemoryTelemetryStore {
    inner: RwLock<Inner>,
    fail_raw_inserts: AtomicBool,
    fail_reading_inserts: AtomicBool,
    fail_latest_upserts: AtomicBool,
    fail_mark_completed: AtomicBool,
}

impl InMemoryTelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Fault injection
    // ========================================================================

    pub fn fail_raw_inserts(&self, fail: bool) {
        self.fail_raw_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reading_inserts(&self, fail: bool) {
        self.fail_reading_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_latest_upserts(&self, fail: bool) {
        self.fail_latest_upserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_mark_completed(&self, fail: bool) {
        self.fail_mark_completed.store(fail, Ordering::SeqCst);
    }

    // ========================================================================
    // Inspection helpers
    // ========================================================================

    pub async fn raw_payload_count(&self) -> usize {
        self.inner.read().await.raw_payloads.len()
    }

    pub async fn sensor_reading_count(&self) -> usize {
        self.inner.read().await.sensor_readings.len()
    }

    pub async fn location_reading_count(&self) -> usize {
        self.inner.read().await.location_readings.len()
    }

    pub async fn latest_state(&self, device_imei: i64) -> Option<DeviceLatestState> {
        self.inner
            .read()
            .await
            .latest_states
            .get(&device_imei)
            .cloned()
    }

    pub async fn latest_state_count(&self) -> usize {
        self.inner.read().await.latest_states.len()
    }

    /// Snapshot upserts in the order they committed.
    pub async fn upsert_log(&self) -> Vec<(i64, i64)> {
        self.inner.read().await.upsert_log.clone()
    }

    fn injected(flag: &AtomicBool) -> StorageResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("injected fault".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TelemetryStore for InMemoryTelemetryStore {
    async fn insert_raw_payload(
        &self,
        payload: &Value,
        status: PayloadStatus,
        validation_errors: Option<&[FieldError]>,
    ) -> StorageResult<i64> {
        Self::injected(&self.fail_raw_inserts)?;

        let mut inner = self.inner.write().await;
        inner.next_raw_id += 1;
        let id = inner.next_raw_id;
        inner.raw_payloads.push(RawPayloadRecord {
            id,
            payload: payload.clone(),
            source: RAW_SOURCE.to_string(),
            status,
            validation_errors: validation_errors.map(|e| e.to_vec()),
            processing_error: None,
            dispatch_task_id: None,
            created_at: Utc::now(),
            processed_at: None,
        });
        Ok(id)
    }

    async fn get_raw_payload(&self, id: i64) -> StorageResult<Option<RawPayloadRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.raw_payloads.iter().find(|r| r.id == id).cloned())
    }

    async fn set_raw_payload_task(&self, id: i64, task_id: &str) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(record) = inner.raw_payloads.iter_mut().find(|r| r.id == id) {
            record.dispatch_task_id = Some(task_id.to_string());
        }
        Ok(())
    }

    async fn mark_raw_payload_completed(&self, id: i64) -> StorageResult<()> {
        Self::injected(&self.fail_mark_completed)?;

        let mut inner = self.inner.write().await;
        if let Some(record) = inner.raw_payloads.iter_mut().find(|r| r.id == id) {
            record.status = PayloadStatus::Completed;
            record.processing_error = None;
            record.processed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_raw_payload_failed(&self, id: i64, error: &str) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(record) = inner.raw_payloads.iter_mut().find(|r| r.id == id) {
            record.status = PayloadStatus::Failed;
            record.processing_error = Some(error.to_string());
            record.processed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn insert_sensor_reading(&self, reading: &NewSensorReading) -> StorageResult<i64> {
        Self::injected(&self.fail_reading_inserts)?;

        let mut inner = self.inner.write().await;
        inner.next_reading_id += 1;
        let id = inner.next_reading_id;
        inner.sensor_readings.push((id, reading.clone()));
        Ok(id)
    }

    async fn insert_location_reading(&self, reading: &NewLocationReading) -> StorageResult<i64> {
        Self::injected(&self.fail_reading_inserts)?;

        let mut inner = self.inner.write().await;
        inner.next_reading_id += 1;
        let id = inner.next_reading_id;
        inner.location_readings.push((id, reading.clone()));
        Ok(id)
    }

    async fn upsert_latest_state(&self, update: &LatestStateUpdate) -> StorageResult<()> {
        Self::injected(&self.fail_latest_upserts)?;

        let mut inner = self.inner.write().await;
        let now = Utc::now();
        match inner.latest_states.entry(update.device_imei) {
            Entry::Occupied(mut occupied) => {
                let existing = occupied.get_mut();
                if update.last_recorded_at < existing.last_recorded_at {
                    tracing::warn!(
                        device_imei = update.device_imei,
                        "out_of_order latest-state update; overwriting by arrival order"
                    );
                }
                existing.apply_update(update, now);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(DeviceLatestState::from_update(update, now));
            }
        }
        inner
            .upsert_log
            .push((update.device_imei, update.last_recorded_at));
        Ok(())
    }

    async fn attach_latest_refs(
        &self,
        device_imei: i64,
        sensor_reading_id: i64,
        location_reading_id: i64,
    ) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(state) = inner.latest_states.get_mut(&device_imei) {
            state.sensor_reading_id = Some(sensor_reading_id);
            state.location_reading_id = Some(location_reading_id);
            state.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list_latest_states(&self, limit: i64) -> StorageResult<Vec<DeviceLatestState>> {
        let inner = self.inner.read().await;
        let mut states: Vec<DeviceLatestState> = inner.latest_states.values().cloned().collect();
        states.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        states.truncate(limit.max(0) as usize);
        Ok(states)
    }

    async fn ping(&self) -> StorageResult<()> {
        Ok(())
    }
}
