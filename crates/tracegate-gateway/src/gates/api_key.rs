//! Shared-secret key gate.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{Instrument, Span};

use tracegate_core::error::messages;
use tracegate_core::{ApiKey, CredentialStore, CustomError, KeyScope};

use super::{Gate, GateRequest, Identity};
use crate::boundary::ApiError;

/// Checks the presented key against the keys currently valid in the store.
///
/// The store is consulted on every call, before the presented key is even
/// looked at, so a store failure surfaces as 500 for every caller.
pub struct ApiKeyGate {
    store: Arc<dyn CredentialStore>,
    scope: KeyScope,
    span: Span,
}

impl ApiKeyGate {
    /// Gate admitting any registered key.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            scope: KeyScope::Any,
            span: tracing::info_span!("api_key_gate"),
        }
    }

    /// Gate admitting only keys within `scope`.
    #[must_use]
    pub fn scoped(store: Arc<dyn CredentialStore>, scope: KeyScope) -> Self {
        Self {
            store,
            scope,
            span: tracing::info_span!("system_api_key_gate"),
        }
    }

    /// Emit events inside `span`.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Check `key`.
    ///
    /// # Errors
    ///
    /// 500 `Unexpected` when the store fails, 403 `AccessDenied` for an
    /// empty key, 403 `InvalidKey` for a key outside the valid set.
    pub async fn verify(&self, key: &ApiKey) -> Result<(), ApiError> {
        self.verify_inner(key).instrument(self.span.clone()).await
    }

    async fn verify_inner(&self, key: &ApiKey) -> Result<(), ApiError> {
        let valid = self.store.valid_keys(&self.scope).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to load valid keys");
            CustomError::internal(messages::UNEXPECTED)
        })?;

        if key.is_empty() {
            tracing::debug!("No API key presented");
            return Err(CustomError::authorization(messages::ACCESS_DENIED).into());
        }

        let presented = key.expose();
        let Some(record) = valid.iter().find(|record| record.key.matches(presented)) else {
            tracing::debug!(key = %key.fingerprint(), "Unknown API key");
            return Err(CustomError::authorization(messages::INVALID_KEY).into());
        };

        tracing::debug!(
            key = %key.fingerprint(),
            application = %record.application_name,
            "API key accepted"
        );
        Ok(())
    }
}

#[async_trait]
impl Gate for ApiKeyGate {
    fn name(&self) -> &'static str {
        "api_key"
    }

    async fn check(&self, request: &GateRequest) -> Result<Identity, ApiError> {
        self.verify(&request.api_key).await?;
        Ok(Identity::anonymous())
    }
}

#[cfg(test)]
mod tests {
    use tracegate_core::{
        ApiKeyRecord, KeyAttribute, MemoryCredentialStore, OperatorId, ReferenceData,
        StoreError, StoreErrorKind,
    };

    use super::*;

    struct DownStore;

    #[async_trait]
    impl CredentialStore for DownStore {
        async fn valid_keys(
            &self,
            _scope: &KeyScope,
        ) -> Result<Vec<ApiKeyRecord>, StoreError> {
            Err(StoreError::new(StoreErrorKind::Connection, "connection refused"))
        }

        async fn operators_for_key(&self, _key: &str) -> Result<Vec<OperatorId>, StoreError> {
            Err(StoreError::new(StoreErrorKind::Connection, "connection refused"))
        }

        async fn cidrs_for_key(&self, _key: &str) -> Result<Vec<String>, StoreError> {
            Err(StoreError::new(StoreErrorKind::Connection, "connection refused"))
        }
    }

    fn store() -> Arc<dyn CredentialStore> {
        Arc::new(MemoryCredentialStore::new(ReferenceData {
            api_keys: vec![
                ApiKeyRecord::new("K1", "connector", KeyAttribute::DataSpace),
                ApiKeyRecord::new("K2", "mes", KeyAttribute::Application),
            ],
            ..ReferenceData::default()
        }))
    }

    fn message(err: ApiError) -> (u16, String) {
        let custom = err.classify();
        (custom.status(), custom.message)
    }

    #[tokio::test]
    async fn test_registered_keys_pass() {
        let gate = ApiKeyGate::new(store());
        assert!(gate.verify(&ApiKey::new("K1")).await.is_ok());
        assert!(gate.verify(&ApiKey::new("K2")).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_key_is_invalid() {
        let gate = ApiKeyGate::new(store());
        let err = gate.verify(&ApiKey::new("K3")).await.unwrap_err();
        assert_eq!(message(err), (403, "InvalidKey".to_string()));
    }

    #[tokio::test]
    async fn test_empty_key_is_access_denied() {
        let gate = ApiKeyGate::new(store());
        let err = gate.verify(&ApiKey::new("")).await.unwrap_err();
        assert_eq!(message(err), (403, "AccessDenied".to_string()));

        let empty = Arc::new(MemoryCredentialStore::default());
        let err = ApiKeyGate::new(empty)
            .verify(&ApiKey::new(""))
            .await
            .unwrap_err();
        assert_eq!(message(err), (403, "AccessDenied".to_string()));
    }

    #[tokio::test]
    async fn test_scope_excludes_other_attributes() {
        let gate = ApiKeyGate::scoped(
            store(),
            KeyScope::Attributes(vec![KeyAttribute::DataSpace, KeyAttribute::Traceability]),
        );
        assert!(gate.verify(&ApiKey::new("K1")).await.is_ok());

        let err = gate.verify(&ApiKey::new("K2")).await.unwrap_err();
        assert_eq!(message(err), (403, "InvalidKey".to_string()));
    }

    #[tokio::test]
    async fn test_store_failure_is_internal_even_without_key() {
        let gate = ApiKeyGate::new(Arc::new(DownStore));

        let err = gate.verify(&ApiKey::new("")).await.unwrap_err();
        assert_eq!(message(err), (500, "Unexpected".to_string()));

        let err = gate.verify(&ApiKey::new("K1")).await.unwrap_err();
        assert_eq!(message(err), (500, "Unexpected".to_string()));
    }

    #[tokio::test]
    async fn test_revocation_applies_to_next_request() {
        let memory = Arc::new(MemoryCredentialStore::new(ReferenceData {
            api_keys: vec![ApiKeyRecord::new("K1", "connector", KeyAttribute::DataSpace)],
            ..ReferenceData::default()
        }));
        let gate = ApiKeyGate::new(memory.clone());
        assert!(gate.verify(&ApiKey::new("K1")).await.is_ok());

        memory.replace(ReferenceData::default()).await;
        assert!(gate.verify(&ApiKey::new("K1")).await.is_err());
    }

    #[tokio::test]
    async fn test_gate_check_yields_no_identity() {
        let gate = ApiKeyGate::new(store());
        let identity = gate
            .check(&GateRequest::new("K1", "", None))
            .await
            .unwrap();
        assert!(identity.claims.is_none());
        assert_eq!(gate.name(), "api_key");
    }
}
