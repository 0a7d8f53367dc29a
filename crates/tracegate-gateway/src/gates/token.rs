//! Bearer-token gate.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{Instrument, Span};

use tracegate_core::error::messages;
use tracegate_core::{Claims, ClaimsError, CustomError, IdentityProvider, ProviderError};

use super::{Gate, GateRequest, Identity};
use crate::boundary::ApiError;

const BEARER_PREFIX: &str = "Bearer ";

/// Why a token did not yield an identity.
#[derive(Debug, Clone, Error)]
pub enum TokenError {
    /// Verification failed or the provider was unreachable.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The token verified but carries no usable operator claim.
    #[error(transparent)]
    Claims(#[from] ClaimsError),
}

impl TokenError {
    /// Whether the provider could not be reached.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Provider(err) if err.is_unavailable())
    }
}

impl From<TokenError> for CustomError {
    fn from(err: TokenError) -> Self {
        if err.is_unavailable() {
            Self::upstream_unavailable(messages::OUTER_SERVICE)
        } else {
            Self::authentication(messages::INVALID_TOKEN)
        }
    }
}

/// Verifies the bearer token and establishes the operator identity.
pub struct TokenGate {
    provider: Arc<dyn IdentityProvider>,
    span: Span,
}

impl TokenGate {
    /// Create a token gate.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            span: tracing::info_span!("token_gate"),
        }
    }

    /// Emit events inside `span`.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Authenticate an `Authorization` header value.
    ///
    /// # Errors
    ///
    /// 401 `AuthenticationRequired` for an empty header, 503 `OuterService`
    /// when the provider is unreachable, 401 `InvalidToken` otherwise.
    pub async fn authenticate(&self, authorization: &str) -> Result<Claims, ApiError> {
        async {
            if authorization.is_empty() {
                tracing::debug!("No bearer token presented");
                return Err(ApiError::Custom(CustomError::authentication(
                    messages::AUTHENTICATION_REQUIRED,
                )));
            }

            let token = authorization
                .strip_prefix(BEARER_PREFIX)
                .unwrap_or(authorization);

            self.identify(token).await.map_err(|e| {
                if e.is_unavailable() {
                    tracing::error!(error = %e, "Identity provider unreachable");
                } else {
                    tracing::warn!(error = %e, "Token rejected");
                }
                ApiError::Custom(e.into())
            })
        }
        .instrument(self.span.clone())
        .await
    }

    /// Verify a bare token and extract its claims.
    ///
    /// # Errors
    ///
    /// Returns the unclassified provider or claim failure.
    pub async fn identify(&self, token: &str) -> Result<Claims, TokenError> {
        let raw = self.provider.verify_id_token(token).await?;
        let claims = Claims::from_raw(raw)?;
        tracing::debug!(operator = %claims.operator_id, "Token verified");
        Ok(claims)
    }
}

#[async_trait]
impl Gate for TokenGate {
    fn name(&self) -> &'static str {
        "token"
    }

    async fn check(&self, request: &GateRequest) -> Result<Identity, ApiError> {
        let claims = self.authenticate(&request.authorization).await?;
        Ok(Identity::authenticated(claims))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;
    use tracegate_core::{LoginResult, RawClaims, RefreshResult};

    use super::*;

    /// Provider whose verification outcome is fixed per token.
    #[derive(Default)]
    struct ScriptedProvider {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl IdentityProvider for ScriptedProvider {
        async fn sign_in_with_password(
            &self,
            _email: &str,
            _password: &str,
        ) -> Result<LoginResult, ProviderError> {
            Ok(LoginResult::default())
        }

        async fn verify_id_token(&self, token: &str) -> Result<RawClaims, ProviderError> {
            self.seen.lock().unwrap().push(token.to_string());
            let claims = match token {
                "good" => json!({ "operator_id": "op-1", "sub": "uid-1" }),
                "no-operator" => json!({ "sub": "uid-1" }),
                "numeric-operator" => json!({ "operator_id": 7 }),
                "down" => return Err(ProviderError::Unavailable("connection refused".into())),
                _ => return Err(ProviderError::InvalidToken("bad signature".into())),
            };
            Ok(claims.as_object().cloned().unwrap_or_default())
        }

        async fn refresh_token(&self, _token: &str) -> Result<RefreshResult, ProviderError> {
            Ok(RefreshResult::default())
        }

        async fn change_password(&self, _uid: &str, _new: &str) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    fn rejection(err: ApiError) -> (u16, String) {
        let custom = err.classify();
        (custom.status(), custom.message)
    }

    #[tokio::test]
    async fn test_bearer_token_yields_claims() {
        let provider = Arc::new(ScriptedProvider::default());
        let gate = TokenGate::new(provider.clone());

        let claims = gate.authenticate("Bearer good").await.unwrap();
        assert_eq!(claims.operator_id(), "op-1");
        assert_eq!(claims.uid, "uid-1");
        assert_eq!(*provider.seen.lock().unwrap(), vec!["good".to_string()]);
    }

    #[tokio::test]
    async fn test_header_without_prefix_is_used_verbatim() {
        let provider = Arc::new(ScriptedProvider::default());
        let gate = TokenGate::new(provider.clone());

        assert!(gate.authenticate("good").await.is_ok());
        let err = gate.authenticate("bearer good").await.unwrap_err();
        assert_eq!(rejection(err), (401, "InvalidToken".to_string()));
        assert_eq!(
            *provider.seen.lock().unwrap(),
            vec!["good".to_string(), "bearer good".to_string()]
        );
    }

    #[tokio::test]
    async fn test_empty_header_requires_authentication() {
        let provider = Arc::new(ScriptedProvider::default());
        let gate = TokenGate::new(provider.clone());

        let err = gate.authenticate("").await.unwrap_err();
        assert_eq!(rejection(err), (401, "AuthenticationRequired".to_string()));
        assert!(provider.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_verification_failure_is_invalid_token() {
        let gate = TokenGate::new(Arc::new(ScriptedProvider::default()));
        let err = gate.authenticate("Bearer forged").await.unwrap_err();
        assert_eq!(rejection(err), (401, "InvalidToken".to_string()));
    }

    #[tokio::test]
    async fn test_missing_operator_claim_is_invalid_token() {
        let gate = TokenGate::new(Arc::new(ScriptedProvider::default()));
        for token in ["Bearer no-operator", "Bearer numeric-operator"] {
            let err = gate.authenticate(token).await.unwrap_err();
            assert_eq!(rejection(err), (401, "InvalidToken".to_string()));
        }
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_outer_service() {
        let gate = TokenGate::new(Arc::new(ScriptedProvider::default()));
        let err = gate.authenticate("Bearer down").await.unwrap_err();
        assert_eq!(rejection(err), (503, "OuterService".to_string()));
    }

    #[tokio::test]
    async fn test_identify_keeps_failure_kind() {
        let gate = TokenGate::new(Arc::new(ScriptedProvider::default()));
        assert!(gate.identify("down").await.unwrap_err().is_unavailable());
        assert!(matches!(
            gate.identify("no-operator").await.unwrap_err(),
            TokenError::Claims(ClaimsError::MissingClaim(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_checks() {
        let gate = Arc::new(TokenGate::new(Arc::new(ScriptedProvider::default())));
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let gate = gate.clone();
                tokio::spawn(async move {
                    let header = if i % 2 == 0 { "Bearer good" } else { "Bearer forged" };
                    gate.check(&GateRequest::new("K1", header, None)).await.is_ok()
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), i % 2 == 0);
        }
    }
}
