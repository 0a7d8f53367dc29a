//! Shared-secret handling.
//!
//! - `ApiKey`: wrapper that prevents accidental logging of key values
//! - Constant-time comparison for key membership tests

use secrecy::{ExposeSecret, SecretBox};
use serde::Deserialize;
use subtle::ConstantTimeEq;

/// Number of leading characters kept by [`ApiKey::fingerprint`].
const FINGERPRINT_PREFIX: usize = 4;

/// API key wrapper that prevents accidental logging.
///
/// The inner value is wrapped with `secrecy::SecretBox` so it never shows up
/// in `Debug` or `Display` output.
#[derive(Deserialize)]
#[serde(from = "String")]
pub struct ApiKey(SecretBox<str>);

impl ApiKey {
    /// Create a new API key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(SecretBox::new(key.into().into_boxed_str()))
    }

    /// Expose the secret value.
    ///
    /// Use sparingly - only for store lookups and comparisons.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Whether no key was presented.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }

    /// Compare against a candidate in constant time.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        constant_time_eq(self.expose(), candidate)
    }

    /// Short, log-safe identifier for this key (`abcd…`).
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let prefix: String = self.expose().chars().take(FINGERPRINT_PREFIX).collect();
        format!("{prefix}…")
    }
}

impl Clone for ApiKey {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl From<String> for ApiKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for ApiKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey([REDACTED])")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Constant-time string equality.
///
/// Length mismatches still perform a comparison so timing does not reveal
/// how long the expected value is.
#[must_use]
pub fn constant_time_eq(expected: &str, provided: &str) -> bool {
    let expected = expected.as_bytes();
    let provided = provided.as_bytes();
    if expected.len() != provided.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    expected.ct_eq(provided).into()
}
