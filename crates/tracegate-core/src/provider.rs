//! Identity provider interface.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{LoginResult, RefreshResult};

/// Claim set of a verified token, as issued.
pub type RawClaims = serde_json::Map<String, serde_json::Value>;

/// Identity provider errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider could not be reached (connect refused, timeout, 5xx).
    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),

    /// The provider answered with a rejection.
    #[error("Identity provider rejected request: {status} - {message}")]
    Rejected {
        /// HTTP status returned by the provider.
        status: u16,
        /// Provider error message.
        message: String,
    },

    /// The token is malformed, expired, revoked or badly signed.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// The provider response could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The provider client is misconfigured.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ProviderError {
    /// Whether this is a transport-level unavailability.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Remote service that authenticates operators and verifies their tokens.
///
/// Implementations are shared across concurrent requests.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authenticate an email/password pair.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<LoginResult, ProviderError>;

    /// Verify an ID token and return its claims.
    async fn verify_id_token(&self, token: &str) -> Result<RawClaims, ProviderError>;

    /// Exchange a refresh token for a fresh access token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<RefreshResult, ProviderError>;

    /// Set a new password for the given user.
    async fn change_password(&self, uid: &str, new_password: &str) -> Result<(), ProviderError>;
}
