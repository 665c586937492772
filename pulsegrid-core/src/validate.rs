//! Payload Validator
//!
//! Structural and semantic validation of inbound PulseTrak documents.
//! The validator works on the untyped JSON document so that it can report
//! every problem at once: checks are run in a fixed order, all failures are
//! collected, and the function never panics or returns early.
//!
//! A document that passes validation is guaranteed to deserialize into
//! [`crate::payload::TrackerPayload`].

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::payload::{normalize_epoch_ms, TrackerPayload};

/// PulseTrak device ids are 15-digit numeric IMEIs.
static IMEI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{15}$").expect("valid IMEI regex"));

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Tunable validation bounds.
///
/// Environment variables:
/// - `PULSEGRID_TIMESTAMP_WINDOW_SECS`: allowed skew around now (default: 1 year)
/// - `PULSEGRID_TEMP_MIN_C` / `PULSEGRID_TEMP_MAX_C`: plausible Celsius range (default: -100..100)
/// - `PULSEGRID_CELLULAR_MIN_DBM` / `PULSEGRID_CELLULAR_MAX_DBM`: plausible dBm range (default: -150..-50)
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Symmetric window around the current time within which a device
    /// timestamp is accepted, in seconds.
    pub timestamp_window_secs: i64,
    pub temperature_min_c: f64,
    pub temperature_max_c: f64,
    pub cellular_min_dbm: f64,
    pub cellular_max_dbm: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            timestamp_window_secs: 365 * 24 * 3600,
            temperature_min_c: -100.0,
            temperature_max_c: 100.0,
            cellular_min_dbm: -150.0,
            cellular_max_dbm: -50.0,
        }
    }
}

impl ValidatorConfig {
    /// Create a ValidatorConfig from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            timestamp_window_secs: env_parse(
                "PULSEGRID_TIMESTAMP_WINDOW_SECS",
                defaults.timestamp_window_secs,
            ),
            temperature_min_c: env_parse("PULSEGRID_TEMP_MIN_C", defaults.temperature_min_c),
            temperature_max_c: env_parse("PULSEGRID_TEMP_MAX_C", defaults.temperature_max_c),
            cellular_min_dbm: env_parse("PULSEGRID_CELLULAR_MIN_DBM", defaults.cellular_min_dbm),
            cellular_max_dbm: env_parse("PULSEGRID_CELLULAR_MAX_DBM", defaults.cellular_max_dbm),
        }
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

// ============================================================================
// REPORT TYPES
// ============================================================================

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FieldError {
    /// Dotted path into the provider document, e.g. `Location.Latitude`.
    pub field: String,
    /// Human-readable description of the failure.
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Outcome of validating one inbound document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<FieldError>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<FieldError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Validate an inbound provider document.
///
/// Pure: reads the document and the clock, touches nothing else. The report
/// is `valid` iff the error list is empty.
pub fn validate(payload: &Value, config: &ValidatorConfig) -> ValidationReport {
    let mut errors = Vec::new();

    check_device_identity(payload, &mut errors);
    check_timestamp(payload, config, &mut errors);
    check_temperature(payload, config, &mut errors);
    check_location(payload, &mut errors);
    check_percentage(payload, "Humidity", &mut errors);
    check_percentage(payload, "Battery", &mut errors);
    check_cellular(payload, config, &mut errors);

    // Field checks passed: the document must also deserialize into the typed
    // payload, since nothing downstream touches the untyped form again.
    if errors.is_empty() {
        if let Err(e) = serde_json::from_value::<TrackerPayload>(payload.clone()) {
            errors.push(FieldError::new(
                "Payload",
                format!("document does not match the PulseTrak schema: {e}"),
            ));
        }
    }

    ValidationReport::from_errors(errors)
}

fn check_device_identity(payload: &Value, errors: &mut Vec<FieldError>) {
    match payload.get("DeviceId") {
        None | Some(Value::Null) => {
            errors.push(FieldError::new("DeviceId", "DeviceId is required"));
        }
        Some(Value::String(s)) if s.is_empty() => {
            errors.push(FieldError::new("DeviceId", "DeviceId must not be empty"));
        }
        Some(Value::String(s)) if !IMEI_RE.is_match(s) => {
            errors.push(FieldError::new(
                "DeviceId",
                "DeviceId must be a 15-digit numeric IMEI",
            ));
        }
        Some(Value::String(_)) => {}
        Some(_) => {
            errors.push(FieldError::new("DeviceId", "DeviceId must be a string"));
        }
    }

    match payload.get("DeviceName") {
        None | Some(Value::Null) => {
            errors.push(FieldError::new("DeviceName", "DeviceName is required"));
        }
        Some(Value::String(_)) => {}
        Some(_) => {
            errors.push(FieldError::new("DeviceName", "DeviceName must be a string"));
        }
    }
}

fn check_timestamp(payload: &Value, config: &ValidatorConfig, errors: &mut Vec<FieldError>) {
    let raw = match payload.get("Timestamp") {
        None | Some(Value::Null) => {
            errors.push(FieldError::new("Timestamp", "Timestamp is required"));
            return;
        }
        Some(v) => match v.as_f64() {
            Some(ts) => ts,
            None => {
                errors.push(FieldError::new("Timestamp", "Timestamp must be numeric"));
                return;
            }
        },
    };

    if raw < 0.0 {
        errors.push(FieldError::new(
            "Timestamp",
            "Timestamp must not be negative",
        ));
        return;
    }

    // The window comparison has to happen in a single unit; devices report
    // either seconds or milliseconds depending on firmware.
    let ts_ms = normalize_epoch_ms(raw);
    let now_ms = Utc::now().timestamp_millis();
    let window_ms = config.timestamp_window_secs * 1000;

    if ts_ms < now_ms - window_ms {
        errors.push(FieldError::new(
            "Timestamp",
            "Timestamp is too far in the past",
        ));
    } else if ts_ms > now_ms + window_ms {
        errors.push(FieldError::new("Timestamp", "Timestamp is in the future"));
    }
}

fn check_temperature(payload: &Value, config: &ValidatorConfig, errors: &mut Vec<FieldError>) {
    let temperature = match payload.get("Temperature") {
        Some(v) if v.is_object() => v,
        _ => {
            errors.push(FieldError::new(
                "Temperature",
                "Temperature object is required",
            ));
            return;
        }
    };

    match temperature.get("Celsius").and_then(Value::as_f64) {
        None => {
            errors.push(FieldError::new(
                "Temperature.Celsius",
                "Temperature.Celsius must be numeric",
            ));
        }
        Some(celsius) => {
            if celsius < config.temperature_min_c || celsius > config.temperature_max_c {
                errors.push(FieldError::new(
                    "Temperature.Celsius",
                    format!(
                        "Temperature.Celsius must be between {} and {}",
                        config.temperature_min_c, config.temperature_max_c
                    ),
                ));
            }
        }
    }
}

fn check_location(payload: &Value, errors: &mut Vec<FieldError>) {
    let location = match payload.get("Location") {
        Some(v) if v.is_object() => v,
        _ => {
            errors.push(FieldError::new("Location", "Location object is required"));
            return;
        }
    };

    match location.get("Latitude").and_then(Value::as_f64) {
        None => {
            errors.push(FieldError::new(
                "Location.Latitude",
                "Location.Latitude must be numeric",
            ));
        }
        Some(lat) if !(-90.0..=90.0).contains(&lat) => {
            errors.push(FieldError::new(
                "Location.Latitude",
                "Location.Latitude must be between -90 and 90",
            ));
        }
        Some(_) => {}
    }

    match location.get("Longitude").and_then(Value::as_f64) {
        None => {
            errors.push(FieldError::new(
                "Location.Longitude",
                "Location.Longitude must be numeric",
            ));
        }
        Some(lon) if !(-180.0..=180.0).contains(&lon) => {
            errors.push(FieldError::new(
                "Location.Longitude",
                "Location.Longitude must be between -180 and 180",
            ));
        }
        Some(_) => {}
    }
}

/// Humidity and Battery share the same optional `{ Percentage }` shape.
fn check_percentage(payload: &Value, section: &str, errors: &mut Vec<FieldError>) {
    let Some(value) = payload.get(section) else {
        return;
    };
    if value.is_null() {
        return;
    }

    let field = format!("{section}.Percentage");
    match value.get("Percentage").and_then(Value::as_f64) {
        None => {
            errors.push(FieldError::new(
                field.clone(),
                format!("{field} must be numeric"),
            ));
        }
        Some(pct) if !(0.0..=100.0).contains(&pct) => {
            errors.push(FieldError::new(
                field.clone(),
                format!("{field} must be between 0 and 100"),
            ));
        }
        Some(_) => {}
    }
}

fn check_cellular(payload: &Value, config: &ValidatorConfig, errors: &mut Vec<FieldError>) {
    let Some(cellular) = payload.get("Cellular") else {
        return;
    };
    let Some(signal) = cellular.get("SignalStrength") else {
        return;
    };
    if signal.is_null() {
        return;
    }

    match signal.as_f64() {
        None => {
            errors.push(FieldError::new(
                "Cellular.SignalStrength",
                "Cellular.SignalStrength must be numeric",
            ));
        }
        Some(dbm) if dbm < config.cellular_min_dbm || dbm > config.cellular_max_dbm => {
            errors.push(FieldError::new(
                "Cellular.SignalStrength",
                format!(
                    "Cellular.SignalStrength must be between {} and {}",
                    config.cellular_min_dbm, config.cellular_max_dbm
                ),
            ));
        }
        Some(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_doc() -> Value {
        json!({
            "DeviceId": "356938035643809",
            "DeviceName": "Pallet 42",
            "Timestamp": Utc::now().timestamp_millis(),
            "Temperature": { "Celsius": 22.5 },
            "Location": { "Latitude": 40.8126, "Longitude": -73.8803 },
            "Humidity": { "Percentage": 45.2 },
            "Battery": { "Percentage": 87.0 },
            "Cellular": { "SignalStrength": -95.0 }
        })
    }

    #[test]
    fn accepts_valid_document() {
        let report = validate(&valid_doc(), &ValidatorConfig::default());
        assert!(report.valid, "unexpected errors: {:?}", report.errors);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn reports_missing_required_fields_by_name() {
        let report = validate(&json!({}), &ValidatorConfig::default());
        assert!(!report.valid);

        let fields: Vec<&str> = report.errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"DeviceId"));
        assert!(fields.contains(&"DeviceName"));
        assert!(fields.contains(&"Timestamp"));
        assert!(fields.contains(&"Temperature"));
        assert!(fields.contains(&"Location"));
    }

    #[test]
    fn rejects_malformed_imei() {
        let mut doc = valid_doc();
        doc["DeviceId"] = json!("12345");
        let report = validate(&doc, &ValidatorConfig::default());
        assert!(report.errors.iter().any(|e| e.field == "DeviceId"));

        doc["DeviceId"] = json!("35693803564380a");
        let report = validate(&doc, &ValidatorConfig::default());
        assert!(report.errors.iter().any(|e| e.field == "DeviceId"));
    }

    #[test]
    fn temperature_boundaries() {
        let config = ValidatorConfig::default();

        for celsius in [-100.0, 100.0] {
            let mut doc = valid_doc();
            doc["Temperature"]["Celsius"] = json!(celsius);
            assert!(validate(&doc, &config).valid, "boundary {celsius} rejected");
        }

        for celsius in [-100.01, 100.01] {
            let mut doc = valid_doc();
            doc["Temperature"]["Celsius"] = json!(celsius);
            let report = validate(&doc, &config);
            assert!(
                report
                    .errors
                    .iter()
                    .any(|e| e.field == "Temperature.Celsius"),
                "out-of-range {celsius} accepted"
            );
        }
    }

    #[test]
    fn coordinate_boundaries() {
        let config = ValidatorConfig::default();

        for (lat, lon) in [(90.0, 180.0), (-90.0, -180.0), (0.0, 0.0)] {
            let mut doc = valid_doc();
            doc["Location"]["Latitude"] = json!(lat);
            doc["Location"]["Longitude"] = json!(lon);
            assert!(validate(&doc, &config).valid, "({lat}, {lon}) rejected");
        }

        let mut doc = valid_doc();
        doc["Location"]["Latitude"] = json!(90.0001);
        let report = validate(&doc, &config);
        assert!(report.errors.iter().any(|e| e.field == "Location.Latitude"));

        let mut doc = valid_doc();
        doc["Location"]["Longitude"] = json!(-180.0001);
        let report = validate(&doc, &config);
        assert!(report
            .errors
            .iter()
            .any(|e| e.field == "Location.Longitude"));
    }

    #[test]
    fn out_of_range_latitude_reported_with_dotted_field() {
        let mut doc = valid_doc();
        doc["Location"]["Latitude"] = json!(95);
        let report = validate(&doc, &ValidatorConfig::default());

        assert!(!report.valid);
        let err = report
            .errors
            .iter()
            .find(|e| e.field == "Location.Latitude")
            .expect("latitude error");
        assert!(err.message.contains("-90"));
    }

    #[test]
    fn timestamp_window_messages_are_distinct() {
        let config = ValidatorConfig::default();
        let now_ms = Utc::now().timestamp_millis();
        let window_ms = config.timestamp_window_secs * 1000;

        let mut doc = valid_doc();
        doc["Timestamp"] = json!(now_ms - window_ms - 60_000);
        let report = validate(&doc, &config);
        assert!(report
            .errors
            .iter()
            .any(|e| e.field == "Timestamp" && e.message.contains("past")));

        doc["Timestamp"] = json!(now_ms + window_ms + 60_000);
        let report = validate(&doc, &config);
        assert!(report
            .errors
            .iter()
            .any(|e| e.field == "Timestamp" && e.message.contains("future")));
    }

    #[test]
    fn second_scale_timestamps_pass_the_window() {
        let mut doc = valid_doc();
        doc["Timestamp"] = json!(Utc::now().timestamp());
        assert!(validate(&doc, &ValidatorConfig::default()).valid);
    }

    #[test]
    fn optional_sections_are_skipped_when_absent() {
        let mut doc = valid_doc();
        doc.as_object_mut().unwrap().remove("Humidity");
        doc.as_object_mut().unwrap().remove("Battery");
        doc.as_object_mut().unwrap().remove("Cellular");
        assert!(validate(&doc, &ValidatorConfig::default()).valid);
    }

    #[test]
    fn optional_sections_are_checked_when_present() {
        let mut doc = valid_doc();
        doc["Humidity"]["Percentage"] = json!(101.0);
        doc["Battery"]["Percentage"] = json!(-1.0);
        doc["Cellular"]["SignalStrength"] = json!(-30.0);

        let report = validate(&doc, &ValidatorConfig::default());
        let fields: Vec<&str> = report.errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"Humidity.Percentage"));
        assert!(fields.contains(&"Battery.Percentage"));
        assert!(fields.contains(&"Cellular.SignalStrength"));
    }

    #[test]
    fn all_errors_are_collected_not_short_circuited() {
        let doc = json!({
            "DeviceId": "",
            "DeviceName": 7,
            "Timestamp": -5,
            "Temperature": { "Celsius": "hot" },
            "Location": { "Latitude": 95, "Longitude": 200 }
        });

        let report = validate(&doc, &ValidatorConfig::default());
        assert!(report.errors.len() >= 6, "got {:?}", report.errors);
    }
}
