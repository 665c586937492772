//! Shared-secret authentication.
//!
//! The webhook provider authenticates with a single pre-shared API key sent
//! in `X-Api-Key` (or as a Bearer token). The key is held in a
//! `SecretString` so it never appears in Debug output, and candidate keys
//! are compared through SHA-256 digests so the comparison cost does not
//! depend on where the key material diverges.

use axum::http::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

const INSECURE_DEFAULT_KEY: &str = "INSECURE_DEFAULT_KEY_CHANGE_IN_PRODUCTION";

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Authentication configuration.
#[derive(Clone)]
pub struct AuthConfig {
    api_key: SecretString,
}

impl AuthConfig {
    /// Create a config with an explicit key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
        }
    }

    /// Create an AuthConfig from the `PULSEGRID_API_KEY` environment
    /// variable, falling back to an insecure development default.
    pub fn from_env() -> Self {
        let key = std::env::var("PULSEGRID_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| {
                tracing::warn!("PULSEGRID_API_KEY not set; using insecure development key");
                INSECURE_DEFAULT_KEY.to_string()
            });
        Self::new(key)
    }

    /// Check a candidate key against the configured key.
    pub fn is_valid_key(&self, candidate: &str) -> bool {
        keys_match(candidate, self.api_key.expose_secret())
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig").finish_non_exhaustive()
    }
}

// ============================================================================
// KEY COMPARISON + EXTRACTION
// ============================================================================

/// Constant-time equality on SHA-256 digests of the two keys.
///
/// Hashing first gives equal-length inputs; the accumulator walks every
/// byte regardless of where they differ.
fn keys_match(candidate: &str, expected: &str) -> bool {
    let a = Sha256::digest(candidate.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Extract the API key from request headers.
///
/// `X-Api-Key` is the primary header; `Authorization: Bearer <key>` is the
/// fallback for callers that cannot set custom headers.
pub fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers.get("x-api-key").and_then(|h| h.to_str().ok()) {
        return Some(key);
    }
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn matching_keys_validate() {
        let config = AuthConfig::new("super-secret-key");
        assert!(config.is_valid_key("super-secret-key"));
        assert!(!config.is_valid_key("super-secret-kez"));
        assert!(!config.is_valid_key(""));
        assert!(!config.is_valid_key("super-secret-key-longer"));
    }

    #[test]
    fn api_key_header_is_primary() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("from-header"));
        headers.insert(
            "authorization",
            HeaderValue::from_static("Bearer from-bearer"),
        );
        assert_eq!(extract_api_key(&headers), Some("from-header"));
    }

    #[test]
    fn bearer_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_static("Bearer from-bearer"),
        );
        assert_eq!(extract_api_key(&headers), Some("from-bearer"));

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic xyz"));
        assert_eq!(extract_api_key(&headers), None);
    }

    #[test]
    fn debug_does_not_leak_the_key() {
        let config = AuthConfig::new("super-secret-key");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret-key"));
    }
}
