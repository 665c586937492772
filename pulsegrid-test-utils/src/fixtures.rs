//! Payload fixtures in the PulseTrak wire format.

use chrono::Utc;
use serde_json::{json, Value};

/// API key used by test router setups.
pub const TEST_API_KEY: &str = "test-api-key-0123456789abcdef";

/// A well-formed 15-digit IMEI for fixtures.
pub const TEST_IMEI: &str = "356938035643809";

/// A fully-populated valid provider document for the given device,
/// timestamped now.
pub fn valid_tracker_document(imei: &str) -> Value {
    json!({
        "DeviceId": imei,
        "DeviceName": "Pallet 42",
        "Timestamp": Utc::now().timestamp_millis(),
        "Temperature": { "Celsius": 22.5 },
        "Humidity": { "Percentage": 45.2 },
        "Light": { "Level": 312.0 },
        "Accelerometer": { "X": 0.012, "Y": -0.004, "Z": 0.998, "Magnitude": null },
        "Location": {
            "Latitude": 40.8126,
            "Longitude": -73.8803,
            "Altitude": 12.0,
            "Accuracy": 8.0,
            "Source": "gps",
            "FormattedAddress": "114 Hunts Point Market, Bronx, NY 10474, USA"
        },
        "Battery": { "Percentage": 87.0 },
        "Cellular": { "SignalStrength": -95.0, "NetworkType": "LTE", "Operator": "Vermilion" },
        "WiFi": { "AccessPointCount": 4 }
    })
}
