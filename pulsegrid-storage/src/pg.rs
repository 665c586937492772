//! PostgreSQL implementation of [`TelemetryStore`].
//!
//! Wraps the deadpool connection pool; every method acquires a connection,
//! runs one statement (the latest-state upsert runs two), and returns. No
//! multi-entity transactions: the pipeline's consistency model is built on
//! independent idempotent writes, not on cross-path atomicity.

use async_trait::async_trait;
use deadpool_postgres::Pool;
use serde_json::Value;
use tokio_postgres::Row;

use pulsegrid_core::{
    DeviceLatestState, FieldError, LatestStateUpdate, NewLocationReading, NewSensorReading,
    PayloadStatus, RAW_SOURCE,
};

use crate::error::{StorageError, StorageResult};
use crate::store::{RawPayloadRecord, TelemetryStore};

/// PostgreSQL-backed telemetry store.
#[derive(Clone)]
pub struct PgTelemetryStore {
    pool: Pool,
}

impl PgTelemetryStore {
    /// Create a store on an existing pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Current pool size, for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn get_conn(&self) -> StorageResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(StorageError::from)
    }
}

fn row_to_raw_payload(row: &Row) -> StorageResult<RawPayloadRecord> {
    let status_str: String = row.get("status");
    let status: PayloadStatus = status_str.parse().map_err(StorageError::Corrupt)?;

    let validation_errors: Option<Vec<FieldError>> = row
        .get::<_, Option<Value>>("validation_errors")
        .map(serde_json::from_value)
        .transpose()?;

    Ok(RawPayloadRecord {
        id: row.get("id"),
        payload: row.get("payload"),
        source: row.get("source"),
        status,
        validation_errors,
        processing_error: row.get("processing_error"),
        dispatch_task_id: row.get("dispatch_task_id"),
        created_at: row.get("created_at"),
        processed_at: row.get("processed_at"),
    })
}

fn row_to_latest_state(row: &Row) -> StorageResult<DeviceLatestState> {
    let accuracy_category = row
        .get::<_, Option<String>>("accuracy_category")
        .map(|s| {
            serde_json::from_value(Value::String(s.clone()))
                .map_err(|_| StorageError::Corrupt(format!("unknown accuracy category '{s}'")))
        })
        .transpose()?;

    Ok(DeviceLatestState {
        device_imei: row.get("device_imei"),
        device_id: row.get("device_id"),
        device_name: row.get("device_name"),
        provider: row.get("provider"),
        last_recorded_at: row.get("last_recorded_at"),
        temperature_c: row.get("temperature_c"),
        humidity_pct: row.get("humidity_pct"),
        light_level: row.get("light_level"),
        accel_x: row.get("accel_x"),
        accel_y: row.get("accel_y"),
        accel_z: row.get("accel_z"),
        accel_magnitude: row.get("accel_magnitude"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        altitude_m: row.get("altitude_m"),
        accuracy_m: row.get("accuracy_m"),
        accuracy_category,
        location_source: row.get("location_source"),
        street: row.get("street"),
        locality: row.get("locality"),
        state: row.get("state"),
        country: row.get("country"),
        postal_code: row.get("postal_code"),
        full_address: row.get("full_address"),
        battery_pct: row.get("battery_pct"),
        cellular_dbm: row.get("cellular_dbm"),
        network_type: row.get("network_type"),
        operator: row.get("operator"),
        wifi_ap_count: row.get("wifi_ap_count"),
        sensor_reading_id: row.get("sensor_reading_id"),
        location_reading_id: row.get("location_reading_id"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl TelemetryStore for PgTelemetryStore {
    async fn insert_raw_payload(
        &self,
        payload: &Value,
        status: PayloadStatus,
        validation_errors: Option<&[FieldError]>,
    ) -> StorageResult<i64> {
        let conn = self.get_conn().await?;
        let errors_json: Option<Value> =
            validation_errors.map(serde_json::to_value).transpose()?;
        let status_str = status.as_str();

        let row = conn
            .query_one(
                "INSERT INTO raw_payloads (payload, source, status, validation_errors) \
                 VALUES ($1, $2, $3, $4) RETURNING id",
                &[payload, &RAW_SOURCE, &status_str, &errors_json],
            )
            .await?;

        Ok(row.get(0))
    }

    async fn get_raw_payload(&self, id: i64) -> StorageResult<Option<RawPayloadRecord>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                "SELECT id, payload, source, status, validation_errors, processing_error, \
                        dispatch_task_id, created_at, processed_at \
                 FROM raw_payloads WHERE id = $1",
                &[&id],
            )
            .await?;

        row.as_ref().map(row_to_raw_payload).transpose()
    }

    async fn set_raw_payload_task(&self, id: i64, task_id: &str) -> StorageResult<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "UPDATE raw_payloads SET dispatch_task_id = $2 WHERE id = $1",
            &[&id, &task_id],
        )
        .await?;
        Ok(())
    }

    async fn mark_raw_payload_completed(&self, id: i64) -> StorageResult<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "UPDATE raw_payloads \
             SET status = 'completed', processed_at = now(), processing_error = NULL \
             WHERE id = $1",
            &[&id],
        )
        .await?;
        Ok(())
    }

    async fn mark_raw_payload_failed(&self, id: i64, error: &str) -> StorageResult<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "UPDATE raw_payloads \
             SET status = 'failed', processing_error = $2, processed_at = now() \
             WHERE id = $1",
            &[&id, &error],
        )
        .await?;
        Ok(())
    }

    async fn insert_sensor_reading(&self, reading: &NewSensorReading) -> StorageResult<i64> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                "INSERT INTO sensor_readings \
                 (device_id, device_imei, recorded_at, provider, reading_type, \
                  temperature_c, humidity_pct, light_level, \
                  accel_x, accel_y, accel_z, accel_magnitude) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
                 RETURNING id",
                &[
                    &reading.device_id,
                    &reading.device_imei,
                    &reading.recorded_at,
                    &reading.provider,
                    &reading.reading_type,
                    &reading.temperature_c,
                    &reading.humidity_pct,
                    &reading.light_level,
                    &reading.accel_x,
                    &reading.accel_y,
                    &reading.accel_z,
                    &reading.accel_magnitude,
                ],
            )
            .await?;

        Ok(row.get(0))
    }

    async fn insert_location_reading(&self, reading: &NewLocationReading) -> StorageResult<i64> {
        let conn = self.get_conn().await?;
        let accuracy_category = reading.accuracy_category.map(|c| c.as_str());

        let row = conn
            .query_one(
                "INSERT INTO location_readings \
                 (device_id, device_imei, recorded_at, provider, reading_type, \
                  latitude, longitude, altitude_m, accuracy_m, accuracy_category, \
                  location_source, street, locality, state, country, postal_code, \
                  full_address, battery_pct, cellular_dbm, network_type, operator, \
                  wifi_ap_count) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, \
                         $15, $16, $17, $18, $19, $20, $21, $22) \
                 RETURNING id",
                &[
                    &reading.device_id,
                    &reading.device_imei,
                    &reading.recorded_at,
                    &reading.provider,
                    &reading.reading_type,
                    &reading.latitude,
                    &reading.longitude,
                    &reading.altitude_m,
                    &reading.accuracy_m,
                    &accuracy_category,
                    &reading.location_source,
                    &reading.street,
                    &reading.locality,
                    &reading.state,
                    &reading.country,
                    &reading.postal_code,
                    &reading.full_address,
                    &reading.battery_pct,
                    &reading.cellular_dbm,
                    &reading.network_type,
                    &reading.operator,
                    &reading.wifi_ap_count,
                ],
            )
            .await?;

        Ok(row.get(0))
    }

    async fn upsert_latest_state(&self, update: &LatestStateUpdate) -> StorageResult<()> {
        let conn = self.get_conn().await?;

        // Arrival-order last-write-wins: a payload older than the stored one
        // still overwrites, but the regression is worth a log line.
        let existing = conn
            .query_opt(
                "SELECT last_recorded_at FROM device_latest_state WHERE device_imei = $1",
                &[&update.device_imei],
            )
            .await?;
        if let Some(row) = existing {
            let stored: i64 = row.get(0);
            if update.last_recorded_at < stored {
                tracing::warn!(
                    device_imei = update.device_imei,
                    stored_recorded_at = stored,
                    incoming_recorded_at = update.last_recorded_at,
                    "out_of_order latest-state update; overwriting by arrival order"
                );
            }
        }

        let accuracy_category = update.accuracy_category.map(|c| c.as_str());

        conn.execute(
            "INSERT INTO device_latest_state \
             (device_imei, device_id, device_name, provider, last_recorded_at, \
              temperature_c, humidity_pct, light_level, \
              accel_x, accel_y, accel_z, accel_magnitude, \
              latitude, longitude, altitude_m, accuracy_m, accuracy_category, \
              location_source, street, locality, state, country, postal_code, \
              full_address, battery_pct, cellular_dbm, network_type, operator, \
              wifi_ap_count, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, \
                     $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, \
                     $27, $28, $29, now()) \
             ON CONFLICT (device_imei) DO UPDATE SET \
                device_id = EXCLUDED.device_id, \
                device_name = EXCLUDED.device_name, \
                provider = EXCLUDED.provider, \
                last_recorded_at = EXCLUDED.last_recorded_at, \
                temperature_c = EXCLUDED.temperature_c, \
                humidity_pct = EXCLUDED.humidity_pct, \
                light_level = EXCLUDED.light_level, \
                accel_x = EXCLUDED.accel_x, \
                accel_y = EXCLUDED.accel_y, \
                accel_z = EXCLUDED.accel_z, \
                accel_magnitude = EXCLUDED.accel_magnitude, \
                latitude = EXCLUDED.latitude, \
                longitude = EXCLUDED.longitude, \
                altitude_m = EXCLUDED.altitude_m, \
                accuracy_m = EXCLUDED.accuracy_m, \
                accuracy_category = EXCLUDED.accuracy_category, \
                location_source = EXCLUDED.location_source, \
                street = EXCLUDED.street, \
                locality = EXCLUDED.locality, \
                state = EXCLUDED.state, \
                country = EXCLUDED.country, \
                postal_code = EXCLUDED.postal_code, \
                full_address = EXCLUDED.full_address, \
                battery_pct = EXCLUDED.battery_pct, \
                cellular_dbm = EXCLUDED.cellular_dbm, \
                network_type = EXCLUDED.network_type, \
                operator = EXCLUDED.operator, \
                wifi_ap_count = EXCLUDED.wifi_ap_count, \
                updated_at = now()",
            &[
                &update.device_imei,
                &update.device_id,
                &update.device_name,
                &update.provider,
                &update.last_recorded_at,
                &update.temperature_c,
                &update.humidity_pct,
                &update.light_level,
                &update.accel_x,
                &update.accel_y,
                &update.accel_z,
                &update.accel_magnitude,
                &update.latitude,
                &update.longitude,
                &update.altitude_m,
                &update.accuracy_m,
                &accuracy_category,
                &update.location_source,
                &update.street,
                &update.locality,
                &update.state,
                &update.country,
                &update.postal_code,
                &update.full_address,
                &update.battery_pct,
                &update.cellular_dbm,
                &update.network_type,
                &update.operator,
                &update.wifi_ap_count,
            ],
        )
        .await?;

        Ok(())
    }

    async fn attach_latest_refs(
        &self,
        device_imei: i64,
        sensor_reading_id: i64,
        location_reading_id: i64,
    ) -> StorageResult<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "UPDATE device_latest_state \
             SET sensor_reading_id = $2, location_reading_id = $3, updated_at = now() \
             WHERE device_imei = $1",
            &[&device_imei, &sensor_reading_id, &location_reading_id],
        )
        .await?;
        Ok(())
    }

    async fn list_latest_states(&self, limit: i64) -> StorageResult<Vec<DeviceLatestState>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                "SELECT device_imei, device_id, device_name, provider, last_recorded_at, \
                        temperature_c, humidity_pct, light_level, \
                        accel_x, accel_y, accel_z, accel_magnitude, \
                        latitude, longitude, altitude_m, accuracy_m, accuracy_category, \
                        location_source, street, locality, state, country, postal_code, \
                        full_address, battery_pct, cellular_dbm, network_type, operator, \
                        wifi_ap_count, sensor_reading_id, location_reading_id, updated_at \
                 FROM device_latest_state \
                 ORDER BY updated_at DESC \
                 LIMIT $1",
                &[&limit],
            )
            .await?;

        rows.iter().map(row_to_latest_state).collect()
    }

    async fn ping(&self) -> StorageResult<()> {
        let conn = self.get_conn().await?;
        conn.query_one("SELECT 1", &[]).await?;
        Ok(())
    }
}
