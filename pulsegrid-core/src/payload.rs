//! Typed representation of the PulseTrak provider payload.
//!
//! Inbound webhook documents are audited as raw JSON, then parsed into
//! [`TrackerPayload`] immediately after validation. Nothing downstream of
//! the validator touches the untyped document again.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Epoch values below this are treated as seconds and scaled to milliseconds.
///
/// PulseTrak firmware revisions disagree on the unit of `Timestamp`; 1e12 ms
/// is September 2001, safely below any reading the fleet can produce, while
/// 1e12 seconds is the year 33658.
const EPOCH_MS_THRESHOLD: f64 = 1e12;

/// Normalize a device-supplied epoch timestamp to milliseconds.
///
/// Applied identically to both reading types and the latest-state timestamp
/// so the projection and the history tables always agree on units.
pub fn normalize_epoch_ms(raw: f64) -> i64 {
    if raw < EPOCH_MS_THRESHOLD {
        (raw * 1000.0) as i64
    } else {
        raw as i64
    }
}

// ============================================================================
// PAYLOAD SECTIONS
// ============================================================================

/// Temperature section. Always present on a valid payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemperatureInfo {
    pub celsius: f64,
}

/// Relative humidity section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HumidityInfo {
    pub percentage: f64,
}

/// Ambient light section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LightInfo {
    pub level: f64,
}

/// 3-axis accelerometer section. Axes and the device-computed magnitude are
/// each independently optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccelerometerInfo {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub magnitude: Option<f64>,
}

/// Location fix section. Always present on a valid payload; everything
/// beyond the coordinate pair is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocationInfo {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    /// Fix accuracy radius in meters.
    pub accuracy: Option<f64>,
    /// Fix source as reported by the device ("gps", "wifi", "cell", ...).
    pub source: Option<String>,
    /// Single-string formatted address, provider-geocoded.
    pub formatted_address: Option<String>,
}

/// Battery section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatteryInfo {
    pub percentage: f64,
}

/// Cellular link section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CellularInfo {
    /// Received signal strength in dBm.
    pub signal_strength: Option<f64>,
    pub network_type: Option<String>,
    pub operator: Option<String>,
}

/// WiFi scan section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WifiInfo {
    pub access_point_count: Option<i32>,
}

// ============================================================================
// TOP-LEVEL PAYLOAD
// ============================================================================

/// A validated PulseTrak webhook payload.
///
/// Field names mirror the provider's PascalCase wire format. Parse this only
/// from documents that passed [`crate::validate::validate`]; the transformer
/// contracts assume validated input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrackerPayload {
    /// 15-digit numeric IMEI as a string.
    pub device_id: String,
    pub device_name: String,
    /// Device-supplied epoch timestamp; seconds or milliseconds depending on
    /// firmware revision. See [`normalize_epoch_ms`].
    pub timestamp: f64,
    pub temperature: TemperatureInfo,
    pub location: LocationInfo,
    pub humidity: Option<HumidityInfo>,
    pub light: Option<LightInfo>,
    pub accelerometer: Option<AccelerometerInfo>,
    pub battery: Option<BatteryInfo>,
    pub cellular: Option<CellularInfo>,
    #[serde(rename = "WiFi")]
    pub wifi: Option<WifiInfo>,
}

impl TrackerPayload {
    /// Numeric IMEI key used as the latest-state primary key.
    pub fn imei_key(&self) -> CoreResult<i64> {
        self.device_id
            .parse::<i64>()
            .map_err(|_| CoreError::InvalidDeviceId(self.device_id.clone()))
    }

    /// Device timestamp normalized to epoch milliseconds.
    pub fn recorded_at_ms(&self) -> i64 {
        normalize_epoch_ms(self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_normalization_scales_seconds() {
        assert_eq!(normalize_epoch_ms(1_722_945_600.0), 1_722_945_600_000);
        assert_eq!(normalize_epoch_ms(1_722_945_600_000.0), 1_722_945_600_000);
    }

    #[test]
    fn parses_pascal_case_wire_format() {
        let doc = serde_json::json!({
            "DeviceId": "356938035643809",
            "DeviceName": "Pallet 42",
            "Timestamp": 1_722_945_600_000i64,
            "Temperature": { "Celsius": 22.5 },
            "Location": {
                "Latitude": 40.8126,
                "Longitude": -73.8803,
                "Accuracy": 8.0,
                "Source": "gps",
                "FormattedAddress": "114 Hunts Point Market, Bronx, NY 10474, USA"
            },
            "Humidity": { "Percentage": 45.2 },
            "Battery": { "Percentage": 87.0 },
            "WiFi": { "AccessPointCount": 4 }
        });

        let payload: TrackerPayload = serde_json::from_value(doc).unwrap();
        assert_eq!(payload.device_id, "356938035643809");
        assert_eq!(payload.imei_key().unwrap(), 356_938_035_643_809);
        assert_eq!(payload.recorded_at_ms(), 1_722_945_600_000);
        assert_eq!(payload.wifi.unwrap().access_point_count, Some(4));
        assert!(payload.cellular.is_none());
    }

    #[test]
    fn non_numeric_device_id_has_no_imei_key() {
        let payload = TrackerPayload {
            device_id: "not-an-imei".to_string(),
            device_name: "x".to_string(),
            timestamp: 0.0,
            temperature: TemperatureInfo { celsius: 0.0 },
            location: LocationInfo {
                latitude: 0.0,
                longitude: 0.0,
                altitude: None,
                accuracy: None,
                source: None,
                formatted_address: None,
            },
            humidity: None,
            light: None,
            accelerometer: None,
            battery: None,
            cellular: None,
            wifi: None,
        };

        assert_eq!(
            payload.imei_key(),
            Err(CoreError::InvalidDeviceId("not-an-imei".to_string()))
        );
    }
}
