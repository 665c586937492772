//! Database schema bootstrap.
//!
//! Ensures the four tables and their indexes exist before serving requests.
//! Applied once at startup; every statement is idempotent, so re-running on
//! an existing database is a no-op.

use deadpool_postgres::Pool;

use crate::error::StorageResult;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS raw_payloads (
    id                BIGSERIAL PRIMARY KEY,
    payload           JSONB       NOT NULL,
    source            TEXT        NOT NULL,
    status            TEXT        NOT NULL,
    validation_errors JSONB,
    processing_error  TEXT,
    dispatch_task_id  TEXT,
    created_at        TIMESTAMPTZ NOT NULL DEFAULT now(),
    processed_at      TIMESTAMPTZ
);

CREATE INDEX IF NOT EXISTS idx_raw_payloads_status
    ON raw_payloads (status);

CREATE TABLE IF NOT EXISTS sensor_readings (
    id              BIGSERIAL PRIMARY KEY,
    device_id       TEXT             NOT NULL,
    device_imei     BIGINT           NOT NULL,
    recorded_at     BIGINT           NOT NULL,
    provider        TEXT             NOT NULL,
    reading_type    TEXT             NOT NULL,
    temperature_c   DOUBLE PRECISION,
    humidity_pct    DOUBLE PRECISION,
    light_level     DOUBLE PRECISION,
    accel_x         DOUBLE PRECISION,
    accel_y         DOUBLE PRECISION,
    accel_z         DOUBLE PRECISION,
    accel_magnitude DOUBLE PRECISION,
    created_at      TIMESTAMPTZ      NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_sensor_readings_device_time
    ON sensor_readings (device_imei, recorded_at DESC);

CREATE TABLE IF NOT EXISTS location_readings (
    id                BIGSERIAL PRIMARY KEY,
    device_id         TEXT             NOT NULL,
    device_imei       BIGINT           NOT NULL,
    recorded_at       BIGINT           NOT NULL,
    provider          TEXT             NOT NULL,
    reading_type      TEXT             NOT NULL,
    latitude          DOUBLE PRECISION NOT NULL,
    longitude         DOUBLE PRECISION NOT NULL,
    altitude_m        DOUBLE PRECISION,
    accuracy_m        DOUBLE PRECISION,
    accuracy_category TEXT,
    location_source   TEXT,
    street            TEXT,
    locality          TEXT,
    state             TEXT,
    country           TEXT,
    postal_code       TEXT,
    full_address      TEXT,
    battery_pct       DOUBLE PRECISION,
    cellular_dbm      DOUBLE PRECISION,
    network_type      TEXT,
    operator          TEXT,
    wifi_ap_count     INTEGER,
    created_at        TIMESTAMPTZ      NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_location_readings_device_time
    ON location_readings (device_imei, recorded_at DESC);

CREATE TABLE IF NOT EXISTS device_latest_state (
    device_imei         BIGINT PRIMARY KEY,
    device_id           TEXT             NOT NULL,
    device_name         TEXT             NOT NULL,
    provider            TEXT             NOT NULL,
    last_recorded_at    BIGINT           NOT NULL,
    temperature_c       DOUBLE PRECISION,
    humidity_pct        DOUBLE PRECISION,
    light_level         DOUBLE PRECISION,
    accel_x             DOUBLE PRECISION,
    accel_y             DOUBLE PRECISION,
    accel_z             DOUBLE PRECISION,
    accel_magnitude     DOUBLE PRECISION,
    latitude            DOUBLE PRECISION NOT NULL,
    longitude           DOUBLE PRECISION NOT NULL,
    altitude_m          DOUBLE PRECISION,
    accuracy_m          DOUBLE PRECISION,
    accuracy_category   TEXT,
    location_source     TEXT,
    street              TEXT,
    locality            TEXT,
    state               TEXT,
    country             TEXT,
    postal_code         TEXT,
    full_address        TEXT,
    battery_pct         DOUBLE PRECISION,
    cellular_dbm        DOUBLE PRECISION,
    network_type        TEXT,
    operator            TEXT,
    wifi_ap_count       INTEGER,
    sensor_reading_id   BIGINT,
    location_reading_id BIGINT,
    updated_at          TIMESTAMPTZ      NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_device_latest_state_updated
    ON device_latest_state (updated_at DESC);
"#;

/// Create or update the database schema (idempotent).
///
/// Numeric sensor columns are DOUBLE PRECISION; values are rounded to their
/// fixed display precision by the transformer before they reach storage.
pub async fn ensure_schema(pool: &Pool) -> StorageResult<()> {
    let conn = pool.get().await?;
    conn.batch_execute(SCHEMA_SQL).await?;
    tracing::info!("Database schema ensured");
    Ok(())
}
