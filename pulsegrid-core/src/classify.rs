//! Critical-Event Classifier
//!
//! Checks a payload's sensor values against the fleet's safe operating
//! ranges. Classification only drives logging and the `critical` flag in
//! the ingest response; it never branches the persistence path.

use serde::{Deserialize, Serialize};

use crate::payload::TrackerPayload;
use crate::transform::accel_magnitude;

// ============================================================================
// OPERATING RANGES
// ============================================================================

/// Safe operating ranges for the tracked fleet.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatingRanges {
    pub temperature_min_c: f64,
    pub temperature_max_c: f64,
    pub humidity_min_pct: f64,
    pub humidity_max_pct: f64,
    pub battery_min_pct: f64,
    pub cellular_min_dbm: f64,
    pub accel_max_g: f64,
}

impl Default for OperatingRanges {
    fn default() -> Self {
        Self {
            temperature_min_c: -20.0,
            temperature_max_c: 30.0,
            humidity_min_pct: 20.0,
            humidity_max_pct: 80.0,
            battery_min_pct: 20.0,
            cellular_min_dbm: -120.0,
            accel_max_g: 2.0,
        }
    }
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Outcome of classifying one payload against the operating ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub is_critical: bool,
    /// One human-readable reason per violated range.
    pub reasons: Vec<String>,
}

/// Classify a payload against the operating ranges.
///
/// Each range is evaluated independently; absent fields are skipped, not
/// treated as violations. Pure, no side effects.
pub fn classify(payload: &TrackerPayload, ranges: &OperatingRanges) -> Classification {
    let mut reasons = Vec::new();

    let celsius = payload.temperature.celsius;
    if celsius < ranges.temperature_min_c || celsius > ranges.temperature_max_c {
        reasons.push(format!(
            "temperature {celsius:.2}C outside operating range {}..{}C",
            ranges.temperature_min_c, ranges.temperature_max_c
        ));
    }

    if let Some(humidity) = payload.humidity.as_ref().map(|h| h.percentage) {
        if humidity < ranges.humidity_min_pct || humidity > ranges.humidity_max_pct {
            reasons.push(format!(
                "humidity {humidity:.1}% outside operating range {}..{}%",
                ranges.humidity_min_pct, ranges.humidity_max_pct
            ));
        }
    }

    if let Some(battery) = payload.battery.as_ref().map(|b| b.percentage) {
        if battery < ranges.battery_min_pct {
            reasons.push(format!(
                "battery {battery:.1}% below minimum {}%",
                ranges.battery_min_pct
            ));
        }
    }

    if let Some(dbm) = payload.cellular.as_ref().and_then(|c| c.signal_strength) {
        if dbm < ranges.cellular_min_dbm {
            reasons.push(format!(
                "cellular signal {dbm:.2}dBm below minimum {}dBm",
                ranges.cellular_min_dbm
            ));
        }
    }

    if let Some(magnitude) = payload.accelerometer.as_ref().and_then(accel_magnitude) {
        if magnitude > ranges.accel_max_g {
            reasons.push(format!(
                "accelerometer magnitude {magnitude:.3}g above maximum {}g",
                ranges.accel_max_g
            ));
        }
    }

    Classification {
        is_critical: !reasons.is_empty(),
        reasons,
    }
}
