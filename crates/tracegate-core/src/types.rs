//! Reference data and token material types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::secrets::ApiKey;

/// Identifier of an interactive operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperatorId(pub String);

impl OperatorId {
    /// Create a new operator ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for OperatorId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Application attribute a key is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAttribute {
    /// Data-space connector.
    DataSpace,
    /// First-party application.
    Application,
    /// Traceability system integration.
    Traceability,
}

impl fmt::Display for KeyAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataSpace => write!(f, "DataSpace"),
            Self::Application => write!(f, "Application"),
            Self::Traceability => write!(f, "Traceability"),
        }
    }
}

/// Which registered keys count as valid for a lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum KeyScope {
    /// Every registered key.
    #[default]
    Any,
    /// Only keys whose attribute is in the subset.
    Attributes(Vec<KeyAttribute>),
}

impl KeyScope {
    /// Whether a key registered under `attribute` is in scope.
    #[must_use]
    pub fn admits(&self, attribute: KeyAttribute) -> bool {
        match self {
            Self::Any => true,
            Self::Attributes(subset) => subset.contains(&attribute),
        }
    }
}

/// A registered machine-caller credential.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRecord {
    /// Shared secret value.
    pub key: ApiKey,
    /// Owning application name.
    pub application_name: String,
    /// Attribute the key is registered under.
    pub attribute: KeyAttribute,
}

impl ApiKeyRecord {
    /// Create a record.
    #[must_use]
    pub fn new(
        key: impl Into<ApiKey>,
        application_name: impl Into<String>,
        attribute: KeyAttribute,
    ) -> Self {
        Self {
            key: key.into(),
            application_name: application_name.into(),
            attribute,
        }
    }
}

/// Binding of a key to an operator.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyOperator {
    /// Bound key.
    pub key: ApiKey,
    /// Bound operator.
    pub operator_id: OperatorId,
}

/// A network block permitted for a key.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CidrEntry {
    /// Bound key.
    pub key: ApiKey,
    /// CIDR notation, e.g. `10.0.0.0/24`.
    pub cidr: String,
}

/// Token material returned by password sign-in.
///
/// Either token may be empty when the identity provider signals invalid
/// credentials without an error status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    /// Access (ID) token.
    pub access_token: String,
    /// Refresh token.
    pub refresh_token: String,
}

/// Token material returned by a refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResult {
    /// Fresh access (ID) token, empty on the invalid-credentials sentinel.
    pub access_token: String,
    /// Rotated refresh token, if the provider issued one.
    pub refresh_token: String,
}
