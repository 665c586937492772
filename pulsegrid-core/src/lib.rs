//! Pulsegrid Core - Payload Model and Pure Transforms
//!
//! Domain types and pure functions shared by the ingestion pipeline. This
//! crate holds the typed provider payload, the payload validator, the
//! reading transformer, and the critical-event classifier. It performs no
//! I/O - persistence and transport live in the other workspace crates.

pub mod address;
pub mod classify;
pub mod error;
pub mod payload;
pub mod readings;
pub mod transform;
pub mod validate;

pub use address::{parse_address, AddressParts};
pub use classify::{classify, Classification, OperatingRanges};
pub use error::{CoreError, CoreResult};
pub use payload::{
    normalize_epoch_ms, AccelerometerInfo, BatteryInfo, CellularInfo, HumidityInfo, LightInfo,
    LocationInfo, TemperatureInfo, TrackerPayload, WifiInfo,
};
pub use readings::{
    DeviceLatestState, LatestStateUpdate, NewLocationReading, NewSensorReading, PayloadStatus,
};
pub use transform::{
    accel_magnitude, normalize_location_source, round_to, to_location_reading, to_sensor_reading,
    AccuracyCategory,
};
pub use validate::{validate, FieldError, ValidationReport, ValidatorConfig};

// ============================================================================
// PROVIDER CONSTANTS
// ============================================================================

/// Provider tag stamped on every normalized reading and latest-state row.
pub const PROVIDER: &str = "pulsetrak";

/// Source tag stamped on every raw audit record.
pub const RAW_SOURCE: &str = "pulsetrak-webhook";

/// Observation type tag for sensor readings.
pub const SENSOR_READING_TYPE: &str = "sensor";

/// Observation type tag for location readings.
pub const LOCATION_READING_TYPE: &str = "location";
