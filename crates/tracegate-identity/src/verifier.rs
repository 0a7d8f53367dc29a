//! ID-token verification.

use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use reqwest::Client;
use tokio::sync::RwLock;

use tracegate_core::config::IdentityConfig;
use tracegate_core::{ProviderError, RawClaims};

/// How long a fetched key set is trusted before it is fetched again.
const JWKS_TTL: Duration = Duration::from_secs(3600);

/// Minimum age of the cached key set before an unknown key id triggers a refetch.
const JWKS_REFETCH_INTERVAL: Duration = Duration::from_secs(60);

const ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// Verifies ID tokens and returns their claims.
pub struct TokenVerifier {
    keys: KeySource,
    project_id: String,
}

enum KeySource {
    Shared(DecodingKey),
    Jwks {
        client: Client,
        url: String,
        cache: RwLock<Option<CachedKeys>>,
    },
}

struct CachedKeys {
    set: JwkSet,
    fetched_at: Instant,
}

impl TokenVerifier {
    /// Verify HS256 tokens signed with a shared secret.
    #[must_use]
    pub fn shared_secret(secret: &[u8], project_id: impl Into<String>) -> Self {
        Self {
            keys: KeySource::Shared(DecodingKey::from_secret(secret)),
            project_id: project_id.into(),
        }
    }

    /// Verify RS256 tokens against the key set published at `url`.
    #[must_use]
    pub fn jwks(client: Client, url: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            keys: KeySource::Jwks {
                client,
                url: url.into(),
                cache: RwLock::new(None),
            },
            project_id: project_id.into(),
        }
    }

    /// Build from configuration; a shared secret wins over a JWKS URL.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Config`] when neither is configured.
    pub fn from_config(config: &IdentityConfig, client: Client) -> Result<Self, ProviderError> {
        if let Some(secret) = &config.shared_secret {
            tracing::warn!("Verifying ID tokens with a shared HS256 secret");
            return Ok(Self::shared_secret(
                secret.as_bytes(),
                config.project_id.clone(),
            ));
        }

        match &config.jwks_url {
            Some(url) => Ok(Self::jwks(client, url.clone(), config.project_id.clone())),
            None => Err(ProviderError::Config(
                "identity needs either jwksUrl or sharedSecret".to_string(),
            )),
        }
    }

    /// Expected issuer, if a project is configured.
    #[must_use]
    pub fn issuer(&self) -> Option<String> {
        (!self.project_id.is_empty()).then(|| format!("{ISSUER_PREFIX}{}", self.project_id))
    }

    /// Verify `token` and return every claim it carries.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidToken`] for malformed, expired or badly
    /// signed tokens and [`ProviderError::Unavailable`] when the key set
    /// cannot be fetched.
    pub async fn verify(&self, token: &str) -> Result<RawClaims, ProviderError> {
        let header = decode_header(token).map_err(invalid)?;

        let (key, algorithm) = match &self.keys {
            KeySource::Shared(key) => (key.clone(), Algorithm::HS256),
            KeySource::Jwks { .. } => {
                let kid = header
                    .kid
                    .as_deref()
                    .ok_or_else(|| ProviderError::InvalidToken("Missing key id".to_string()))?;
                (self.jwk_key(kid).await?, Algorithm::RS256)
            }
        };

        let data = decode::<RawClaims>(token, &key, &self.validation(algorithm)).map_err(invalid)?;
        Ok(data.claims)
    }

    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        match self.issuer() {
            Some(issuer) => {
                validation.set_issuer(&[issuer]);
                validation.set_audience(&[&self.project_id]);
            }
            None => validation.validate_aud = false,
        }
        validation
    }

    async fn jwk_key(&self, kid: &str) -> Result<DecodingKey, ProviderError> {
        let KeySource::Jwks { client, url, cache } = &self.keys else {
            return Err(ProviderError::Config("No key set configured".to_string()));
        };

        {
            let cached = cache.read().await;
            if let Some(cached) = cached.as_ref() {
                let age = cached.fetched_at.elapsed();
                if age < JWKS_TTL {
                    if let Some(jwk) = cached.set.find(kid) {
                        return DecodingKey::from_jwk(jwk).map_err(invalid);
                    }
                    if age < JWKS_REFETCH_INTERVAL {
                        return Err(unknown_kid(kid));
                    }
                }
            }
        }

        // Stale, empty, or the key may have been rotated in since the last fetch.
        let set = fetch_jwks(client, url).await?;
        let key = set.find(kid).map(DecodingKey::from_jwk).transpose();

        *cache.write().await = Some(CachedKeys {
            set,
            fetched_at: Instant::now(),
        });

        key.map_err(invalid)?.ok_or_else(|| unknown_kid(kid))
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys = match &self.keys {
            KeySource::Shared(_) => "shared-secret",
            KeySource::Jwks { .. } => "jwks",
        };
        f.debug_struct("TokenVerifier")
            .field("keys", &keys)
            .field("project_id", &self.project_id)
            .finish()
    }
}

async fn fetch_jwks(client: &Client, url: &str) -> Result<JwkSet, ProviderError> {
    tracing::debug!(url, "Fetching signing keys");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

    if !response.status().is_success() {
        return Err(ProviderError::Unavailable(format!(
            "Key set endpoint returned {}",
            response.status()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::Decode(e.to_string()))
}

fn unknown_kid(kid: &str) -> ProviderError {
    ProviderError::InvalidToken(format!("Unknown key id: {kid}"))
}

#[allow(clippy::needless_pass_by_value)]
fn invalid(err: jsonwebtoken::errors::Error) -> ProviderError {
    ProviderError::InvalidToken(err.to_string())
}
