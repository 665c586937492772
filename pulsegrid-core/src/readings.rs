//! Normalized record types produced by the transformer and owned by the
//! storage layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transform::AccuracyCategory;

// ============================================================================
// AUDIT STATUS
// ============================================================================

/// Lifecycle status of a raw audit record.
///
/// Transitions are pending -> completed or pending -> failed; rows are never
/// deleted and the payload column is never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum PayloadStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PayloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadStatus::Pending => "pending",
            PayloadStatus::Processing => "processing",
            PayloadStatus::Completed => "completed",
            PayloadStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for PayloadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PayloadStatus::Pending),
            "processing" => Ok(PayloadStatus::Processing),
            "completed" => Ok(PayloadStatus::Completed),
            "failed" => Ok(PayloadStatus::Failed),
            other => Err(format!("unknown payload status '{other}'")),
        }
    }
}

impl std::fmt::Display for PayloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// READING RECORDS
// ============================================================================

/// One normalized sensor observation, ready for append-only insertion.
///
/// All numeric fields are already rounded to their storage precision by the
/// transformer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSensorReading {
    pub device_id: String,
    pub device_imei: i64,
    /// Device-supplied event time, epoch milliseconds.
    pub recorded_at: i64,
    pub provider: String,
    pub reading_type: String,
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub light_level: Option<f64>,
    pub accel_x: Option<f64>,
    pub accel_y: Option<f64>,
    pub accel_z: Option<f64>,
    pub accel_magnitude: Option<f64>,
}

/// One normalized location observation, ready for append-only insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLocationReading {
    pub device_id: String,
    pub device_imei: i64,
    pub recorded_at: i64,
    pub provider: String,
    pub reading_type: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: Option<f64>,
    pub accuracy_m: Option<f64>,
    pub accuracy_category: Option<AccuracyCategory>,
    pub location_source: Option<String>,
    pub street: Option<String>,
    pub locality: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    /// Provider-formatted address, preserved verbatim.
    pub full_address: Option<String>,
    pub battery_pct: Option<f64>,
    pub cellular_dbm: Option<f64>,
    pub network_type: Option<String>,
    pub operator: Option<String>,
    pub wifi_ap_count: Option<i32>,
}

// ============================================================================
// LATEST-STATE PROJECTION
// ============================================================================

/// Critical-field snapshot applied to the latest-state projection.
///
/// Built from a pair of freshly transformed readings; carries no reading ids
/// because the hot path writes the snapshot before the readings exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestStateUpdate {
    pub device_imei: i64,
    pub device_id: String,
    pub device_name: String,
    pub provider: String,
    pub last_recorded_at: i64,
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub light_level: Option<f64>,
    pub accel_x: Option<f64>,
    pub accel_y: Option<f64>,
    pub accel_z: Option<f64>,
    pub accel_magnitude: Option<f64>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: Option<f64>,
    pub accuracy_m: Option<f64>,
    pub accuracy_category: Option<AccuracyCategory>,
    pub location_source: Option<String>,
    pub street: Option<String>,
    pub locality: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub full_address: Option<String>,
    pub battery_pct: Option<f64>,
    pub cellular_dbm: Option<f64>,
    pub network_type: Option<String>,
    pub operator: Option<String>,
    pub wifi_ap_count: Option<i32>,
}

impl LatestStateUpdate {
    /// Assemble a snapshot from the two normalized readings of one payload.
    pub fn from_readings(
        device_name: &str,
        sensor: &NewSensorReading,
        location: &NewLocationReading,
    ) -> Self {
        Self {
            device_imei: sensor.device_imei,
            device_id: sensor.device_id.clone(),
            device_name: device_name.to_string(),
            provider: sensor.provider.clone(),
            last_recorded_at: sensor.recorded_at,
            temperature_c: sensor.temperature_c,
            humidity_pct: sensor.humidity_pct,
            light_level: sensor.light_level,
            accel_x: sensor.accel_x,
            accel_y: sensor.accel_y,
            accel_z: sensor.accel_z,
            accel_magnitude: sensor.accel_magnitude,
            latitude: location.latitude,
            longitude: location.longitude,
            altitude_m: location.altitude_m,
            accuracy_m: location.accuracy_m,
            accuracy_category: location.accuracy_category,
            location_source: location.location_source.clone(),
            street: location.street.clone(),
            locality: location.locality.clone(),
            state: location.state.clone(),
            country: location.country.clone(),
            postal_code: location.postal_code.clone(),
            full_address: location.full_address.clone(),
            battery_pct: location.battery_pct,
            cellular_dbm: location.cellular_dbm,
            network_type: location.network_type.clone(),
            operator: location.operator.clone(),
            wifi_ap_count: location.wifi_ap_count,
        }
    }
}

/// One dashboard-facing latest-state row: the snapshot plus weak references
/// to the readings that produced it and the bookkeeping timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeviceLatestState {
    pub device_imei: i64,
    pub device_id: String,
    pub device_name: String,
    pub provider: String,
    pub last_recorded_at: i64,
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub light_level: Option<f64>,
    pub accel_x: Option<f64>,
    pub accel_y: Option<f64>,
    pub accel_z: Option<f64>,
    pub accel_magnitude: Option<f64>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: Option<f64>,
    pub accuracy_m: Option<f64>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub accuracy_category: Option<AccuracyCategory>,
    pub location_source: Option<String>,
    pub street: Option<String>,
    pub locality: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub full_address: Option<String>,
    pub battery_pct: Option<f64>,
    pub cellular_dbm: Option<f64>,
    pub network_type: Option<String>,
    pub operator: Option<String>,
    pub wifi_ap_count: Option<i32>,
    /// Weak reference to the sensor reading behind the snapshot; may lag the
    /// snapshot fields while the cold path catches up.
    pub sensor_reading_id: Option<i64>,
    pub location_reading_id: Option<i64>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: DateTime<Utc>,
}

impl DeviceLatestState {
    /// Build a fresh row from a snapshot update, with no reading refs yet.
    pub fn from_update(update: &LatestStateUpdate, updated_at: DateTime<Utc>) -> Self {
        Self {
            device_imei: update.device_imei,
            device_id: update.device_id.clone(),
            device_name: update.device_name.clone(),
            provider: update.provider.clone(),
            last_recorded_at: update.last_recorded_at,
            temperature_c: update.temperature_c,
            humidity_pct: update.humidity_pct,
            light_level: update.light_level,
            accel_x: update.accel_x,
            accel_y: update.accel_y,
            accel_z: update.accel_z,
            accel_magnitude: update.accel_magnitude,
            latitude: update.latitude,
            longitude: update.longitude,
            altitude_m: update.altitude_m,
            accuracy_m: update.accuracy_m,
            accuracy_category: update.accuracy_category,
            location_source: update.location_source.clone(),
            street: update.street.clone(),
            locality: update.locality.clone(),
            state: update.state.clone(),
            country: update.country.clone(),
            postal_code: update.postal_code.clone(),
            full_address: update.full_address.clone(),
            battery_pct: update.battery_pct,
            cellular_dbm: update.cellular_dbm,
            network_type: update.network_type.clone(),
            operator: update.operator.clone(),
            wifi_ap_count: update.wifi_ap_count,
            sensor_reading_id: None,
            location_reading_id: None,
            updated_at,
        }
    }

    /// Apply a newer snapshot in place, keeping whatever reading refs the
    /// cold path has already attached.
    pub fn apply_update(&mut self, update: &LatestStateUpdate, updated_at: DateTime<Utc>) {
        let sensor_reading_id = self.sensor_reading_id;
        let location_reading_id = self.location_reading_id;
        *self = Self::from_update(update, updated_at);
        self.sensor_reading_id = sensor_reading_id;
        self.location_reading_id = location_reading_id;
    }
}
