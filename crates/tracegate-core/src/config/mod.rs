//! Configuration loading and validation.
//!
//! JSON5 format, camelCase keys, every field defaulted.
//! Config location: `~/.tracegate/tracegate.json5` unless overridden.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{KeyAttribute, KeyScope};

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Trust-boundary settings.
    #[serde(default)]
    pub security: SecurityConfig,

    /// Identity provider client settings.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Credential store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Missing file means defaults.
    ///
    /// # Errors
    ///
    /// Returns error if config cannot be loaded or parsed.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    ///
    /// The result is not validated; see [`Config::resolve`].
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(json5::from_str(&content)?)
    }

    /// Load from `path` (or the default location), apply overrides from
    /// `lookup`, then validate the result.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or if the
    /// overridden configuration is invalid.
    pub fn resolve(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => Self::load_default()?,
        }
        .with_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses `TRACEGATE_CONFIG` if set, otherwise `~/.tracegate/tracegate.json5`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("TRACEGATE_CONFIG") {
            return PathBuf::from(path);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tracegate")
            .join("tracegate.json5")
    }

    /// Apply overrides from an arbitrary variable lookup.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup("TRACEGATE_IP_RESTRICTION") {
            self.security.ip_restriction_enabled =
                value == "1" || value.eq_ignore_ascii_case("true");
        }

        if let Some(key) = lookup("TRACEGATE_IDENTITY_API_KEY") {
            self.identity.api_key = Some(key);
        }

        if let Some(secret) = lookup("TRACEGATE_IDENTITY_SHARED_SECRET") {
            self.identity.shared_secret = Some(secret);
        }

        if let Some(port) = lookup("TRACEGATE_PORT").and_then(|p| p.parse().ok()) {
            self.gateway.port = port;
        }

        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns error describing the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.port == 0 {
            return Err(ConfigError::Validation(
                "Gateway port cannot be 0".to_string(),
            ));
        }

        if self.security.system_key_attributes.is_empty() {
            return Err(ConfigError::Validation(
                "security.systemKeyAttributes cannot be empty".to_string(),
            ));
        }

        if self.identity.jwks_url.is_none() && self.identity.shared_secret.is_none() {
            return Err(ConfigError::Validation(
                "identity needs either jwksUrl or sharedSecret".to_string(),
            ));
        }

        if self.identity.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "identity.timeoutSecs cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Gateway server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address to bind.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Proxies whose `X-Forwarded-For` header is trusted.
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            trusted_proxies: Vec::new(),
        }
    }
}

const fn default_port() -> u16 {
    8080
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

/// Trust-boundary settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityConfig {
    /// Run the network gate after the API key gate.
    #[serde(default)]
    pub ip_restriction_enabled: bool,

    /// Attributes admitted by the system-scoped key gate.
    #[serde(default = "default_system_key_attributes")]
    pub system_key_attributes: Vec<KeyAttribute>,
}

impl SecurityConfig {
    /// Key scope for system endpoints.
    #[must_use]
    pub fn system_scope(&self) -> KeyScope {
        KeyScope::Attributes(self.system_key_attributes.clone())
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            ip_restriction_enabled: false,
            system_key_attributes: default_system_key_attributes(),
        }
    }
}

fn default_system_key_attributes() -> Vec<KeyAttribute> {
    vec![KeyAttribute::DataSpace, KeyAttribute::Traceability]
}

/// Identity provider client settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityConfig {
    /// Web API key sent with sign-in and refresh calls.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the account endpoints.
    #[serde(default = "default_auth_base_url")]
    pub auth_base_url: String,

    /// Base URL of the token endpoint.
    #[serde(default = "default_token_base_url")]
    pub token_base_url: String,

    /// Project id (token audience and issuer suffix).
    #[serde(default)]
    pub project_id: String,

    /// JWKS endpoint for RS256 token verification.
    #[serde(default = "default_jwks_url")]
    pub jwks_url: Option<String>,

    /// HS256 secret for local emulators; takes precedence over `jwks_url`.
    #[serde(default)]
    pub shared_secret: Option<String>,

    /// Bearer token for administrative password changes.
    #[serde(default)]
    pub admin_token: Option<String>,

    /// Per-call timeout in seconds.
    #[serde(default = "default_identity_timeout")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("auth_base_url", &self.auth_base_url)
            .field("token_base_url", &self.token_base_url)
            .field("project_id", &self.project_id)
            .field("jwks_url", &self.jwks_url)
            .field("shared_secret", &self.shared_secret.as_ref().map(|_| "[REDACTED]"))
            .field("admin_token", &self.admin_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            auth_base_url: default_auth_base_url(),
            token_base_url: default_token_base_url(),
            project_id: String::new(),
            jwks_url: default_jwks_url(),
            shared_secret: None,
            admin_token: None,
            timeout_secs: default_identity_timeout(),
        }
    }
}

fn default_auth_base_url() -> String {
    "https://identitytoolkit.googleapis.com".to_string()
}

fn default_token_base_url() -> String {
    "https://securetoken.googleapis.com".to_string()
}

#[allow(clippy::unnecessary_wraps)]
fn default_jwks_url() -> Option<String> {
    Some(
        "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com"
            .to_string(),
    )
}

const fn default_identity_timeout() -> u64 {
    10
}

/// Credential store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// JSON5 reference-data file; an empty store is used when unset.
    #[serde(default)]
    pub reference_data_path: Option<PathBuf>,
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}
