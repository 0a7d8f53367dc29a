//! REST identity provider client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use tracegate_core::config::IdentityConfig;
use tracegate_core::{IdentityProvider, LoginResult, ProviderError, RawClaims, RefreshResult};

use crate::verifier::TokenVerifier;

/// Identity provider reached over its REST API.
pub struct HttpIdentityProvider {
    client: Client,
    api_key: Option<String>,
    auth_base_url: String,
    token_base_url: String,
    admin_token: Option<String>,
    verifier: TokenVerifier,
}

impl HttpIdentityProvider {
    /// Create a provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Config`] if the HTTP client cannot be built
    /// or no token verification source is configured.
    pub fn from_config(config: &IdentityConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Config(e.to_string()))?;
        let verifier = TokenVerifier::from_config(config, client.clone())?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            auth_base_url: config.auth_base_url.trim_end_matches('/').to_string(),
            token_base_url: config.token_base_url.trim_end_matches('/').to_string(),
            admin_token: config.admin_token.clone(),
            verifier,
        })
    }

    async fn post<B: Serialize + Sync>(
        &self,
        url: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> Result<Response, ProviderError> {
        let mut request = self.client.post(url).json(body);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        if response.status().is_server_error() {
            return Err(ProviderError::Unavailable(format!(
                "{url} returned {}",
                response.status()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<LoginResult, ProviderError> {
        let url = format!("{}/v1/accounts:signInWithPassword", self.auth_base_url);
        let body = SignInRequest {
            email,
            password,
            return_secure_token: true,
        };

        let response = self.post(&url, &body, None).await?;
        if response.status().is_client_error() {
            let (status, message) = rejection(response).await;
            tracing::warn!(status, message = %message, "Sign-in rejected");
            return Ok(LoginResult::default());
        }

        let result: SignInResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        Ok(LoginResult {
            access_token: result.id_token,
            refresh_token: result.refresh_token,
        })
    }

    async fn verify_id_token(&self, token: &str) -> Result<RawClaims, ProviderError> {
        self.verifier.verify(token).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<RefreshResult, ProviderError> {
        let url = format!("{}/v1/token", self.token_base_url);
        let body = RefreshRequest {
            grant_type: "refresh_token",
            refresh_token,
        };

        let response = self.post(&url, &body, None).await?;
        if response.status().is_client_error() {
            let (status, message) = rejection(response).await;
            tracing::warn!(status, message = %message, "Token refresh rejected");
            return Ok(RefreshResult::default());
        }

        let result: RefreshResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        Ok(RefreshResult {
            access_token: result.id_token,
            refresh_token: result.refresh_token,
        })
    }

    async fn change_password(&self, uid: &str, new_password: &str) -> Result<(), ProviderError> {
        let url = format!("{}/v1/accounts:update", self.auth_base_url);
        let body = UpdateAccountRequest {
            local_id: uid,
            password: new_password,
            return_secure_token: false,
        };

        let response = self.post(&url, &body, self.admin_token.as_deref()).await?;
        if !response.status().is_success() {
            let (status, message) = rejection(response).await;
            return Err(ProviderError::Rejected { status, message });
        }

        tracing::info!(uid, "Password changed");
        Ok(())
    }
}

impl std::fmt::Debug for HttpIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpIdentityProvider")
            .field("auth_base_url", &self.auth_base_url)
            .field("token_base_url", &self.token_base_url)
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}

/// Status and provider message of a rejected call.
async fn rejection(response: Response) -> (u16, String) {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&text)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("").to_string());
    (status.as_u16(), message)
}

// Provider wire types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    #[serde(default)]
    id_token: String,
    #[serde(default)]
    refresh_token: String,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'a str,
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    id_token: String,
    #[serde(default)]
    refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateAccountRequest<'a> {
    local_id: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}
