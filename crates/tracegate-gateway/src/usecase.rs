//! Login, refresh and password change against the identity provider.

use std::sync::Arc;

use tracing::{Instrument, Span};

use tracegate_core::error::messages;
use tracegate_core::{CustomError, IdentityProvider, LoginResult, RefreshResult};

use crate::boundary::ApiError;

/// Credential flows for interactive operators.
///
/// Provider errors pass through unclassified. Empty token material from a
/// successful call is the provider's "invalid credentials" sentinel and is
/// turned into 401 `InvalidCredentials`.
pub struct CredentialUsecase {
    provider: Arc<dyn IdentityProvider>,
    span: Span,
}

impl CredentialUsecase {
    /// Create the usecase.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            span: tracing::info_span!("credential_usecase"),
        }
    }

    /// Emit events inside `span`.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Sign in with an account id (email) and password.
    ///
    /// # Errors
    ///
    /// 401 `InvalidCredentials` when either token comes back empty; provider
    /// errors unchanged.
    pub async fn login(&self, account_id: &str, password: &str) -> Result<LoginResult, ApiError> {
        async {
            let result = self
                .provider
                .sign_in_with_password(account_id, password)
                .await?;

            if result.access_token.is_empty() || result.refresh_token.is_empty() {
                tracing::warn!("Sign-in returned empty token material");
                return Err(invalid_credentials());
            }

            tracing::info!("Operator signed in");
            Ok(result)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Exchange a refresh token for a fresh access token.
    ///
    /// # Errors
    ///
    /// 401 `InvalidCredentials` when the access token comes back empty;
    /// provider errors unchanged.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResult, ApiError> {
        async {
            let result = self.provider.refresh_token(refresh_token).await?;

            if result.access_token.is_empty() {
                tracing::warn!("Refresh returned an empty access token");
                return Err(invalid_credentials());
            }

            Ok(result)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Set a new password for `uid`.
    ///
    /// # Errors
    ///
    /// Provider errors unchanged.
    pub async fn change_password(&self, uid: &str, new_password: &str) -> Result<(), ApiError> {
        self.provider
            .change_password(uid, new_password)
            .instrument(self.span.clone())
            .await
            .map_err(ApiError::from)
    }
}

fn invalid_credentials() -> ApiError {
    CustomError::authentication(messages::INVALID_CREDENTIALS).into()
}
