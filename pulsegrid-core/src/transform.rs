//! Transformer
//!
//! Pure conversion from a validated [`TrackerPayload`] into the two
//! normalized reading records. Callers must validate first; the only
//! failure mode left after validation is a device id that cannot be keyed
//! numerically.
//!
//! Rounding policy (half away from zero at the scaled digit):
//! temperature 2dp, humidity 1dp, light 1dp, accelerometer axes and
//! magnitude 3dp, cellular dBm 2dp.

use serde::{Deserialize, Serialize};

use crate::address::parse_address;
use crate::error::CoreResult;
use crate::payload::{AccelerometerInfo, TrackerPayload};
use crate::readings::{NewLocationReading, NewSensorReading};
use crate::{LOCATION_READING_TYPE, PROVIDER, SENSOR_READING_TYPE};

/// Round to a fixed number of decimal places, half away from zero.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

fn round_opt(value: Option<f64>, decimals: u32) -> Option<f64> {
    value.map(|v| round_to(v, decimals))
}

// ============================================================================
// ACCURACY CATEGORY
// ============================================================================

/// Coarse bucket for a location fix's accuracy radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum AccuracyCategory {
    High,
    Medium,
    Low,
}

impl AccuracyCategory {
    /// Categorize an accuracy radius: <=10 m High, <=100 m Medium, else Low.
    pub fn from_meters(meters: Option<f64>) -> Option<Self> {
        let meters = meters?;
        if meters <= 10.0 {
            Some(AccuracyCategory::High)
        } else if meters <= 100.0 {
            Some(AccuracyCategory::Medium)
        } else {
            Some(AccuracyCategory::Low)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccuracyCategory::High => "High",
            AccuracyCategory::Medium => "Medium",
            AccuracyCategory::Low => "Low",
        }
    }
}

impl std::fmt::Display for AccuracyCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SOURCE TAG + MAGNITUDE HELPERS
// ============================================================================

/// Normalize the device's location-source tag for display.
///
/// Case-folds first, then restores the canonical casing of known sources;
/// anything unknown gets its first letter capitalized.
pub fn normalize_location_source(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    match lowered.as_str() {
        "wifi" => "WiFi".to_string(),
        "gps" => "GPS".to_string(),
        _ => {
            let mut chars = lowered.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => lowered,
            }
        }
    }
}

/// Effective accelerometer magnitude: the device-reported scalar when
/// present, otherwise the Euclidean norm of the three axes.
pub fn accel_magnitude(accel: &AccelerometerInfo) -> Option<f64> {
    if let Some(m) = accel.magnitude {
        return Some(m);
    }
    match (accel.x, accel.y, accel.z) {
        (Some(x), Some(y), Some(z)) => Some((x * x + y * y + z * z).sqrt()),
        _ => None,
    }
}

// ============================================================================
// TRANSFORMS
// ============================================================================

/// Build the normalized sensor reading for a validated payload.
pub fn to_sensor_reading(payload: &TrackerPayload) -> CoreResult<NewSensorReading> {
    let accel = payload.accelerometer.as_ref();

    Ok(NewSensorReading {
        device_id: payload.device_id.clone(),
        device_imei: payload.imei_key()?,
        recorded_at: payload.recorded_at_ms(),
        provider: PROVIDER.to_string(),
        reading_type: SENSOR_READING_TYPE.to_string(),
        temperature_c: Some(round_to(payload.temperature.celsius, 2)),
        humidity_pct: round_opt(payload.humidity.as_ref().map(|h| h.percentage), 1),
        light_level: round_opt(payload.light.as_ref().map(|l| l.level), 1),
        accel_x: round_opt(accel.and_then(|a| a.x), 3),
        accel_y: round_opt(accel.and_then(|a| a.y), 3),
        accel_z: round_opt(accel.and_then(|a| a.z), 3),
        accel_magnitude: round_opt(accel.and_then(accel_magnitude), 3),
    })
}

/// Build the normalized location reading for a validated payload.
pub fn to_location_reading(payload: &TrackerPayload) -> CoreResult<NewLocationReading> {
    let location = &payload.location;
    let address = location
        .formatted_address
        .as_deref()
        .map(parse_address)
        .unwrap_or_default();

    Ok(NewLocationReading {
        device_id: payload.device_id.clone(),
        device_imei: payload.imei_key()?,
        recorded_at: payload.recorded_at_ms(),
        provider: PROVIDER.to_string(),
        reading_type: LOCATION_READING_TYPE.to_string(),
        latitude: round_to(location.latitude, 6),
        longitude: round_to(location.longitude, 6),
        altitude_m: round_opt(location.altitude, 2),
        accuracy_m: round_opt(location.accuracy, 2),
        accuracy_category: AccuracyCategory::from_meters(location.accuracy),
        location_source: location
            .source
            .as_deref()
            .map(normalize_location_source),
        street: address.street,
        locality: address.locality,
        state: address.state,
        country: address.country,
        postal_code: address.postal_code,
        full_address: location.formatted_address.clone(),
        battery_pct: round_opt(payload.battery.as_ref().map(|b| b.percentage), 1),
        cellular_dbm: round_opt(
            payload.cellular.as_ref().and_then(|c| c.signal_strength),
            2,
        ),
        network_type: payload
            .cellular
            .as_ref()
            .and_then(|c| c.network_type.clone()),
        operator: payload.cellular.as_ref().and_then(|c| c.operator.clone()),
        wifi_ap_count: payload.wifi.as_ref().and_then(|w| w.access_point_count),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{
        BatteryInfo, CellularInfo, HumidityInfo, LightInfo, LocationInfo, TemperatureInfo,
        WifiInfo,
    };

    fn sample_payload() -> TrackerPayload {
        TrackerPayload {
            device_id: "356938035643809".to_string(),
            device_name: "Pallet 42".to_string(),
            timestamp: 1_722_945_600_000.0,
            temperature: TemperatureInfo { celsius: 10.078125 },
            location: LocationInfo {
                latitude: 40.8126,
                longitude: -73.8803,
                altitude: Some(12.345),
                accuracy: Some(8.0),
                source: Some("gps".to_string()),
                formatted_address: Some(
                    "114 Hunts Point Market, Bronx, NY 10474, USA".to_string(),
                ),
            },
            humidity: Some(HumidityInfo { percentage: 45.27 }),
            light: Some(LightInfo { level: 312.44 }),
            accelerometer: Some(AccelerometerInfo {
                x: Some(-0.5625),
                y: Some(0.125),
                z: Some(0.9814),
                magnitude: None,
            }),
            battery: Some(BatteryInfo { percentage: 87.05 }),
            cellular: Some(CellularInfo {
                signal_strength: Some(-95.456),
                network_type: Some("LTE".to_string()),
                operator: Some("Vermilion".to_string()),
            }),
            wifi: Some(WifiInfo {
                access_point_count: Some(4),
            }),
        }
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_to(10.078125, 2), 10.08);
        assert_eq!(round_to(-0.5625, 3), -0.563);
        assert_eq!(round_to(2.5, 0), 3.0);
        assert_eq!(round_to(-2.5, 0), -3.0);
    }

    #[test]
    fn sensor_reading_applies_field_precision() {
        let reading = to_sensor_reading(&sample_payload()).unwrap();

        assert_eq!(reading.device_imei, 356_938_035_643_809);
        assert_eq!(reading.recorded_at, 1_722_945_600_000);
        assert_eq!(reading.provider, PROVIDER);
        assert_eq!(reading.reading_type, SENSOR_READING_TYPE);
        assert_eq!(reading.temperature_c, Some(10.08));
        assert_eq!(reading.humidity_pct, Some(45.3));
        assert_eq!(reading.light_level, Some(312.4));
        assert_eq!(reading.accel_x, Some(-0.563));
    }

    #[test]
    fn magnitude_computed_from_axes_when_scalar_absent() {
        let reading = to_sensor_reading(&sample_payload()).unwrap();
        // sqrt(0.5625^2 + 0.125^2 + 0.9814^2) = 1.13804.., rounded to 3dp
        assert_eq!(reading.accel_magnitude, Some(1.138));
    }

    #[test]
    fn reported_magnitude_wins_over_axes() {
        let mut payload = sample_payload();
        payload.accelerometer.as_mut().unwrap().magnitude = Some(2.7182);
        let reading = to_sensor_reading(&payload).unwrap();
        assert_eq!(reading.accel_magnitude, Some(2.718));
    }

    #[test]
    fn location_reading_parses_address_and_categorizes_accuracy() {
        let reading = to_location_reading(&sample_payload()).unwrap();

        assert_eq!(reading.street.as_deref(), Some("114 Hunts Point Market"));
        assert_eq!(reading.locality.as_deref(), Some("Bronx"));
        assert_eq!(reading.state.as_deref(), Some("NY"));
        assert_eq!(reading.postal_code.as_deref(), Some("10474"));
        assert_eq!(reading.country.as_deref(), Some("USA"));
        assert_eq!(
            reading.full_address.as_deref(),
            Some("114 Hunts Point Market, Bronx, NY 10474, USA")
        );
        assert_eq!(reading.accuracy_category, Some(AccuracyCategory::High));
        assert_eq!(reading.location_source.as_deref(), Some("GPS"));
        assert_eq!(reading.cellular_dbm, Some(-95.46));
        assert_eq!(reading.wifi_ap_count, Some(4));
    }

    #[test]
    fn accuracy_category_boundaries() {
        let cases = [
            (5.0, AccuracyCategory::High),
            (10.0, AccuracyCategory::High),
            (50.0, AccuracyCategory::Medium),
            (100.0, AccuracyCategory::Medium),
            (101.0, AccuracyCategory::Low),
            (500.0, AccuracyCategory::Low),
        ];
        for (meters, expected) in cases {
            assert_eq!(
                AccuracyCategory::from_meters(Some(meters)),
                Some(expected),
                "at {meters} m"
            );
        }
        assert_eq!(AccuracyCategory::from_meters(None), None);
    }

    #[test]
    fn location_source_normalization() {
        assert_eq!(normalize_location_source("WIFI"), "WiFi");
        assert_eq!(normalize_location_source("gps"), "GPS");
        assert_eq!(normalize_location_source("CELL"), "Cell");
        assert_eq!(normalize_location_source("fused"), "Fused");
    }

    #[test]
    fn transform_is_deterministic() {
        let payload = sample_payload();
        assert_eq!(
            to_sensor_reading(&payload).unwrap(),
            to_sensor_reading(&payload).unwrap()
        );
        assert_eq!(
            to_location_reading(&payload).unwrap(),
            to_location_reading(&payload).unwrap()
        );
    }

    #[test]
    fn absent_optionals_stay_absent() {
        let mut payload = sample_payload();
        payload.humidity = None;
        payload.light = None;
        payload.accelerometer = None;
        payload.battery = None;
        payload.cellular = None;
        payload.wifi = None;
        payload.location.accuracy = None;
        payload.location.source = None;
        payload.location.formatted_address = None;

        let sensor = to_sensor_reading(&payload).unwrap();
        assert_eq!(sensor.humidity_pct, None);
        assert_eq!(sensor.accel_magnitude, None);

        let location = to_location_reading(&payload).unwrap();
        assert_eq!(location.accuracy_category, None);
        assert_eq!(location.location_source, None);
        assert_eq!(location.street, None);
        assert_eq!(location.full_address, None);
        assert_eq!(location.battery_pct, None);
    }
}
