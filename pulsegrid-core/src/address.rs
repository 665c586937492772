//! Heuristic parser for the provider's single-string formatted address.
//!
//! Splits on commas and pattern-matches the usual US-style
//! `street, locality, STATE ZIP, country` layout. This is not a geocoder:
//! malformed or non-US addresses degrade to partially-empty components and
//! the full string is always preserved verbatim by the caller.

use once_cell::sync::Lazy;
use regex::Regex;

static STATE_ZIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z]{2})\s+(\d{5}(?:-\d{4})?)$").expect("valid state+zip regex"));
static STATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2}$").expect("valid state regex"));
static ZIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{5}(?:-\d{4})?$").expect("valid zip regex"));
static EMBEDDED_ZIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{5}(?:-\d{4})?").expect("valid embedded zip regex"));

/// Address components extracted from a formatted address string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressParts {
    pub street: Option<String>,
    pub locality: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// Parse a comma-separated formatted address into components.
pub fn parse_address(formatted: &str) -> AddressParts {
    let segments: Vec<&str> = formatted
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let mut parts = AddressParts::default();
    if segments.is_empty() {
        return parts;
    }

    parts.street = segments.first().map(|s| s.to_string());
    parts.locality = segments.get(1).map(|s| s.to_string());

    if let Some(region) = segments.get(2) {
        if let Some(caps) = STATE_ZIP_RE.captures(region) {
            parts.state = Some(caps[1].to_string());
            parts.postal_code = Some(caps[2].to_string());
        } else if STATE_RE.is_match(region) {
            parts.state = Some(region.to_string());
        } else if ZIP_RE.is_match(region) {
            parts.postal_code = Some(region.to_string());
        }
    }

    if segments.len() >= 4 {
        let last = segments[segments.len() - 1];
        parts.country = Some(last.to_string());

        // Some feeds fold the zip into the country segment.
        if parts.postal_code.is_none() {
            if let Some(m) = EMBEDDED_ZIP_RE.find(last) {
                parts.postal_code = Some(m.as_str().to_string());
            }
        }
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_us_address() {
        let parts = parse_address("114 Hunts Point Market, Bronx, NY 10474, USA");
        assert_eq!(parts.street.as_deref(), Some("114 Hunts Point Market"));
        assert_eq!(parts.locality.as_deref(), Some("Bronx"));
        assert_eq!(parts.state.as_deref(), Some("NY"));
        assert_eq!(parts.postal_code.as_deref(), Some("10474"));
        assert_eq!(parts.country.as_deref(), Some("USA"));
    }

    #[test]
    fn state_only_and_zip_only_third_segments() {
        let parts = parse_address("1 Main St, Springfield, IL, USA");
        assert_eq!(parts.state.as_deref(), Some("IL"));
        assert_eq!(parts.postal_code, None);

        let parts = parse_address("1 Main St, Springfield, 62701, USA");
        assert_eq!(parts.state, None);
        assert_eq!(parts.postal_code.as_deref(), Some("62701"));
    }

    #[test]
    fn zip_plus_four() {
        let parts = parse_address("1 Main St, Springfield, IL 62701-1234, USA");
        assert_eq!(parts.postal_code.as_deref(), Some("62701-1234"));
    }

    #[test]
    fn zip_recovered_from_country_segment() {
        let parts = parse_address("1 Main St, Springfield, IL, 62701 USA");
        assert_eq!(parts.state.as_deref(), Some("IL"));
        assert_eq!(parts.country.as_deref(), Some("62701 USA"));
        assert_eq!(parts.postal_code.as_deref(), Some("62701"));
    }

    #[test]
    fn short_addresses_have_no_country() {
        let parts = parse_address("Somewhere, Town, NY 10001");
        assert_eq!(parts.country, None);
        assert_eq!(parts.state.as_deref(), Some("NY"));
        assert_eq!(parts.postal_code.as_deref(), Some("10001"));
    }

    #[test]
    fn degrades_gracefully_on_unstructured_input() {
        let parts = parse_address("Kilometer 14 Ruta Nacional 9");
        assert_eq!(
            parts.street.as_deref(),
            Some("Kilometer 14 Ruta Nacional 9")
        );
        assert_eq!(parts.locality, None);
        assert_eq!(parts.state, None);

        assert_eq!(parse_address(""), AddressParts::default());
        assert_eq!(parse_address(" , , "), AddressParts::default());
    }
}
