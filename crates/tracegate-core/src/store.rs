//! Credential store interface and the in-memory reference-data store.
//!
//! The store is read-only from the trust boundary's point of view and is
//! consulted on every request; nothing here caches lookups across requests.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::types::{ApiKeyOperator, ApiKeyRecord, CidrEntry, KeyScope, OperatorId};

/// Discriminant of a storage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    /// The storage engine was shut down by an administrator.
    AdminShutdown,
    /// The storage engine shut down after a crash.
    CrashShutdown,
    /// No connection to the storage engine could be made.
    Connection,
    /// A query failed.
    Query,
    /// Stored data could not be decoded.
    Decode,
    /// Local reference data could not be read.
    Io,
    /// Anything else.
    Other,
}

impl StoreErrorKind {
    /// Map a SQLSTATE code to a kind.
    #[must_use]
    pub fn from_sqlstate(code: &str) -> Self {
        match code {
            "57P01" => Self::AdminShutdown,
            "57P02" => Self::CrashShutdown,
            "08000" | "08001" | "08003" | "08004" | "08006" => Self::Connection,
            _ => Self::Query,
        }
    }

    /// Whether the engine is going away (administrative or crash shutdown).
    #[must_use]
    pub const fn is_shutdown(self) -> bool {
        matches!(self, Self::AdminShutdown | Self::CrashShutdown)
    }
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AdminShutdown => "admin shutdown",
            Self::CrashShutdown => "crash shutdown",
            Self::Connection => "connection",
            Self::Query => "query",
            Self::Decode => "decode",
            Self::Io => "io",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// Storage failure with an explicit discriminant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Store error ({kind}): {message}")]
pub struct StoreError {
    /// What went wrong.
    pub kind: StoreErrorKind,
    /// Engine-provided description; never shown to callers.
    pub message: String,
}

impl StoreError {
    /// Create a store error.
    #[must_use]
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Read-only repository of valid API keys and their bindings.
///
/// Implementations are shared across concurrent requests.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Keys currently valid within `scope`.
    async fn valid_keys(&self, scope: &KeyScope) -> Result<Vec<ApiKeyRecord>, StoreError>;

    /// Operators bound to `key`.
    async fn operators_for_key(&self, key: &str) -> Result<Vec<OperatorId>, StoreError>;

    /// CIDR strings bound to exactly `key`.
    async fn cidrs_for_key(&self, key: &str) -> Result<Vec<String>, StoreError>;
}

/// Reference data served by [`MemoryCredentialStore`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceData {
    /// Registered keys.
    #[serde(default)]
    pub api_keys: Vec<ApiKeyRecord>,
    /// Key-to-operator bindings.
    #[serde(default)]
    pub api_key_operators: Vec<ApiKeyOperator>,
    /// Key-to-network bindings.
    #[serde(default)]
    pub cidr_allowlist: Vec<CidrEntry>,
}

impl ReferenceData {
    /// Load reference data from a JSON5 file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StoreError::new(
                StoreErrorKind::Io,
                format!("Failed to read {}: {e}", path.display()),
            )
        })?;
        Self::parse(&content)
    }

    /// Parse reference data from JSON5 text.
    ///
    /// # Errors
    ///
    /// Returns error if the text is not valid reference data.
    pub fn parse(content: &str) -> Result<Self, StoreError> {
        json5::from_str(content).map_err(|e| StoreError::new(StoreErrorKind::Decode, e.to_string()))
    }
}

/// Credential store holding reference data in memory.
///
/// [`MemoryCredentialStore::replace`] swaps the whole data set; the next
/// lookup sees the new data.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    data: RwLock<ReferenceData>,
}

impl MemoryCredentialStore {
    /// Create a store over the given data.
    #[must_use]
    pub fn new(data: ReferenceData) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Load a store from a JSON5 reference-data file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let data = ReferenceData::load(path)?;
        tracing::info!(
            keys = data.api_keys.len(),
            operators = data.api_key_operators.len(),
            cidrs = data.cidr_allowlist.len(),
            "Loaded credential reference data"
        );
        Ok(Self::new(data))
    }

    /// Replace all reference data.
    pub async fn replace(&self, data: ReferenceData) {
        *self.data.write().await = data;
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn valid_keys(&self, scope: &KeyScope) -> Result<Vec<ApiKeyRecord>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .api_keys
            .iter()
            .filter(|record| scope.admits(record.attribute))
            .cloned()
            .collect())
    }

    async fn operators_for_key(&self, key: &str) -> Result<Vec<OperatorId>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .api_key_operators
            .iter()
            .filter(|binding| binding.key.matches(key))
            .map(|binding| binding.operator_id.clone())
            .collect())
    }

    async fn cidrs_for_key(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .cidr_allowlist
            .iter()
            .filter(|entry| entry.key.matches(key))
            .map(|entry| entry.cidr.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::types::KeyAttribute;

    const SAMPLE: &str = r#"{
        // keys registered for the plant network
        apiKeys: [
            { key: "K1", applicationName: "connector", attribute: "DataSpace" },
            { key: "K2", applicationName: "mes", attribute: "Application" },
            { key: "K3", applicationName: "tracer", attribute: "Traceability" },
        ],
        apiKeyOperators: [
            { key: "K2", operatorId: "op-1" },
            { key: "K2", operatorId: "op-2" },
        ],
        cidrAllowlist: [
            { key: "K1", cidr: "10.0.0.0/24" },
            { key: "K1", cidr: "192.168.10.0/28" },
        ],
    }"#;

    fn store() -> MemoryCredentialStore {
        MemoryCredentialStore::new(ReferenceData::parse(SAMPLE).unwrap())
    }

    fn names(records: &[ApiKeyRecord]) -> Vec<&str> {
        records.iter().map(|r| r.key.expose()).collect()
    }

    #[tokio::test]
    async fn test_valid_keys_any_scope() {
        let keys = store().valid_keys(&KeyScope::Any).await.unwrap();
        assert_eq!(names(&keys), vec!["K1", "K2", "K3"]);
    }

    #[tokio::test]
    async fn test_valid_keys_attribute_scope() {
        let scope = KeyScope::Attributes(vec![KeyAttribute::DataSpace, KeyAttribute::Traceability]);
        let keys = store().valid_keys(&scope).await.unwrap();
        assert_eq!(names(&keys), vec!["K1", "K3"]);
    }

    #[tokio::test]
    async fn test_operators_for_key() {
        let operators = store().operators_for_key("K2").await.unwrap();
        assert_eq!(operators, vec![OperatorId::new("op-1"), OperatorId::new("op-2")]);
        assert!(store().operators_for_key("K1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cidrs_for_key() {
        let store = store();
        assert_eq!(
            store.cidrs_for_key("K1").await.unwrap(),
            vec!["10.0.0.0/24".to_string(), "192.168.10.0/28".to_string()]
        );
        assert!(store.cidrs_for_key("K2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_takes_effect_immediately() {
        let store = store();
        store.replace(ReferenceData::default()).await;
        assert!(store.valid_keys(&KeyScope::Any).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let store = MemoryCredentialStore::from_file(file.path()).unwrap();
        assert_eq!(store.valid_keys(&KeyScope::Any).await.unwrap().len(), 3);
    }

    #[test]
    fn test_parse_error_is_decode_kind() {
        let err = ReferenceData::parse("{ apiKeys: [ { key: 1 } ] }").unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::Decode);
    }

    #[test]
    fn test_missing_file_is_io_kind() {
        let err = ReferenceData::load(Path::new("/nonexistent/tracegate/ref.json5")).unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::Io);
    }

    #[test]
    fn test_sqlstate_mapping() {
        assert_eq!(StoreErrorKind::from_sqlstate("57P01"), StoreErrorKind::AdminShutdown);
        assert_eq!(StoreErrorKind::from_sqlstate("57P02"), StoreErrorKind::CrashShutdown);
        assert_eq!(StoreErrorKind::from_sqlstate("08006"), StoreErrorKind::Connection);
        assert_eq!(StoreErrorKind::from_sqlstate("57P0"), StoreErrorKind::Query);
        assert_eq!(StoreErrorKind::from_sqlstate("xx57P01"), StoreErrorKind::Query);
        assert!(StoreErrorKind::AdminShutdown.is_shutdown());
        assert!(StoreErrorKind::CrashShutdown.is_shutdown());
        assert!(!StoreErrorKind::Connection.is_shutdown());
    }
}
