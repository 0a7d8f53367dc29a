//! Verified caller identity.
//!
//! [`Claims`] can only be built through [`Claims::from_raw`], which fails
//! when the `operator_id` custom claim is absent or not a string.

use serde_json::Value;
use thiserror::Error;

use crate::provider::RawClaims;
use crate::types::OperatorId;

/// Custom claim carrying the operator id.
pub const OPERATOR_ID_CLAIM: &str = "operator_id";

/// Claim extraction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimsError {
    /// A required claim is absent.
    #[error("Missing claim: {0}")]
    MissingClaim(&'static str),

    /// A claim is present with the wrong JSON type.
    #[error("Claim '{claim}' must be a {expected}")]
    WrongType {
        /// Claim name.
        claim: &'static str,
        /// Expected JSON type.
        expected: &'static str,
    },
}

/// The verified identity of the caller for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    /// Operator the token was issued for.
    pub operator_id: OperatorId,
    /// Identity-provider user id (`sub`, falling back to `user_id`).
    pub uid: String,
    /// Token issuer.
    pub issuer: String,
    /// Token audience(s).
    pub audience: Vec<String>,
    /// Issued-at (Unix seconds).
    pub issued_at: i64,
    /// Expiry (Unix seconds).
    pub expires_at: i64,
    /// Every claim as verified.
    pub raw: RawClaims,
}

impl Claims {
    /// Extract typed claims from a verified claim set.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError::MissingClaim`] when `operator_id` is absent and
    /// [`ClaimsError::WrongType`] when it is not a string.
    pub fn from_raw(raw: RawClaims) -> Result<Self, ClaimsError> {
        let operator_id = match raw.get(OPERATOR_ID_CLAIM) {
            None | Some(Value::Null) => return Err(ClaimsError::MissingClaim(OPERATOR_ID_CLAIM)),
            Some(Value::String(id)) => OperatorId::new(id.clone()),
            Some(_) => {
                return Err(ClaimsError::WrongType {
                    claim: OPERATOR_ID_CLAIM,
                    expected: "string",
                });
            }
        };

        let uid = string_claim(&raw, "sub")
            .or_else(|| string_claim(&raw, "user_id"))
            .unwrap_or_default();
        let issuer = string_claim(&raw, "iss").unwrap_or_default();
        let audience = match raw.get("aud") {
            Some(Value::String(aud)) => vec![aud.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        let issued_at = raw.get("iat").and_then(Value::as_i64).unwrap_or_default();
        let expires_at = raw.get("exp").and_then(Value::as_i64).unwrap_or_default();

        Ok(Self {
            operator_id,
            uid,
            issuer,
            audience,
            issued_at,
            expires_at,
            raw,
        })
    }

    /// Operator id as a string slice.
    #[must_use]
    pub fn operator_id(&self) -> &str {
        self.operator_id.as_ref()
    }
}

impl TryFrom<RawClaims> for Claims {
    type Error = ClaimsError;

    fn try_from(raw: RawClaims) -> Result<Self, Self::Error> {
        Self::from_raw(raw)
    }
}

fn string_claim(raw: &RawClaims, name: &str) -> Option<String> {
    raw.get(name).and_then(Value::as_str).map(str::to_string)
}
