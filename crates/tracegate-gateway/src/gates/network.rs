//! Source-network gate.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{Instrument, Span};

use tracegate_core::error::messages;
use tracegate_core::{ApiKey, AuditSink, Cidr, CredentialStore, CustomError, IpCheckRecord};

use super::{Gate, GateRequest, Identity};
use crate::boundary::ApiError;

/// Admits a caller only from a network bound to the presented key.
///
/// Fails closed: a store failure, an unknown caller address or an empty
/// allowlist all deny. Every decision is written to the audit sink.
pub struct NetworkGate {
    store: Arc<dyn CredentialStore>,
    audit: Arc<dyn AuditSink>,
    span: Span,
}

impl NetworkGate {
    /// Create a network gate.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            store,
            audit,
            span: tracing::info_span!("network_gate"),
        }
    }

    /// Emit events inside `span`.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Check that `ip` may use `key`.
    ///
    /// # Errors
    ///
    /// 403 `IPNotAuthorizedForKey` on any denial.
    pub async fn check_ip(&self, key: &ApiKey, ip: Option<IpAddr>) -> Result<(), ApiError> {
        if self.allows(key, ip).await {
            Ok(())
        } else {
            Err(CustomError::authorization(messages::IP_NOT_AUTHORIZED_FOR_KEY).into())
        }
    }

    /// Whether `ip` may use `key`; the decision is audited.
    pub async fn allows(&self, key: &ApiKey, ip: Option<IpAddr>) -> bool {
        async {
            let allowed = self.evaluate(key, ip).await;
            self.audit
                .record_ip_check(&IpCheckRecord::new(key.clone(), ip, allowed));
            allowed
        }
        .instrument(self.span.clone())
        .await
    }

    async fn evaluate(&self, key: &ApiKey, ip: Option<IpAddr>) -> bool {
        let Some(ip) = ip else {
            tracing::warn!(key = %key.fingerprint(), "Caller address unknown");
            return false;
        };

        let blocks = match self.store.cidrs_for_key(key.expose()).await {
            Ok(blocks) => blocks,
            Err(e) => {
                tracing::warn!(error = %e, key = %key.fingerprint(), "CIDR lookup failed");
                return false;
            }
        };

        let allowed = blocks
            .iter()
            .filter_map(|raw| match raw.parse::<Cidr>() {
                Ok(cidr) => Some(cidr),
                Err(e) => {
                    tracing::warn!(error = %e, cidr = %raw, "Skipping malformed allowlist entry");
                    None
                }
            })
            .any(|cidr| cidr.contains(ip));

        if !allowed {
            tracing::debug!(key = %key.fingerprint(), %ip, blocks = blocks.len(), "Address not allowed");
        }
        allowed
    }
}

#[async_trait]
impl Gate for NetworkGate {
    fn name(&self) -> &'static str {
        "network"
    }

    async fn check(&self, request: &GateRequest) -> Result<Identity, ApiError> {
        self.check_ip(&request.api_key, request.client_ip).await?;
        Ok(Identity::anonymous())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tracegate_core::{
        ApiKeyRecord, CidrEntry, KeyScope, MemoryCredentialStore, OperatorId, ReferenceData,
        StoreError, StoreErrorKind,
    };

    use super::*;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<(Option<IpAddr>, bool)>>);

    impl AuditSink for RecordingSink {
        fn record_ip_check(&self, record: &IpCheckRecord) {
            self.0.lock().unwrap().push((record.ip, record.success));
        }
    }

    struct DownStore(StoreErrorKind);

    #[async_trait]
    impl CredentialStore for DownStore {
        async fn valid_keys(&self, _scope: &KeyScope) -> Result<Vec<ApiKeyRecord>, StoreError> {
            Ok(Vec::new())
        }

        async fn operators_for_key(&self, _key: &str) -> Result<Vec<OperatorId>, StoreError> {
            Ok(Vec::new())
        }

        async fn cidrs_for_key(&self, _key: &str) -> Result<Vec<String>, StoreError> {
            Err(StoreError::new(self.0, "server closed the connection"))
        }
    }

    fn entry(key: &str, cidr: &str) -> CidrEntry {
        CidrEntry {
            key: ApiKey::new(key),
            cidr: cidr.to_string(),
        }
    }

    fn gate(entries: Vec<CidrEntry>, sink: Arc<RecordingSink>) -> NetworkGate {
        let store = Arc::new(MemoryCredentialStore::new(ReferenceData {
            cidr_allowlist: entries,
            ..ReferenceData::default()
        }));
        NetworkGate::new(store, sink)
    }

    fn ip(s: &str) -> Option<IpAddr> {
        Some(s.parse().unwrap())
    }

    fn denial(err: ApiError) -> (u16, String) {
        let custom = err.classify();
        (custom.status(), custom.message)
    }

    #[tokio::test]
    async fn test_address_inside_bound_block_passes() {
        let sink = Arc::new(RecordingSink::default());
        let gate = gate(vec![entry("K", "10.0.0.0/24")], sink.clone());
        let key = ApiKey::new("K");

        assert!(gate.check_ip(&key, ip("10.0.0.5")).await.is_ok());

        let err = gate.check_ip(&key, ip("192.168.1.1")).await.unwrap_err();
        assert_eq!(denial(err), (403, "IPNotAuthorizedForKey".to_string()));

        assert_eq!(
            *sink.0.lock().unwrap(),
            vec![(ip("10.0.0.5"), true), (ip("192.168.1.1"), false)]
        );
    }

    #[tokio::test]
    async fn test_blocks_bound_to_other_keys_do_not_apply() {
        let sink = Arc::new(RecordingSink::default());
        let gate = gate(vec![entry("OTHER", "0.0.0.0/0")], sink);
        assert!(gate.check_ip(&ApiKey::new("K"), ip("10.0.0.5")).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_allowlist_denies_everything() {
        let sink = Arc::new(RecordingSink::default());
        let gate = gate(Vec::new(), sink.clone());
        assert!(!gate.allows(&ApiKey::new("K"), ip("10.0.0.5")).await);
        assert!(!gate.allows(&ApiKey::new("K"), ip("::1")).await);
        assert_eq!(sink.0.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_any_matching_block_suffices() {
        let sink = Arc::new(RecordingSink::default());
        let gate = gate(
            vec![
                entry("K", "172.16.0.0/12"),
                entry("K", "not a cidr"),
                entry("K", "2001:db8::/32"),
            ],
            sink,
        );
        let key = ApiKey::new("K");
        assert!(gate.allows(&key, ip("172.20.1.1")).await);
        assert!(gate.allows(&key, ip("2001:db8::7")).await);
        assert!(!gate.allows(&key, ip("10.0.0.1")).await);
    }

    #[tokio::test]
    async fn test_unknown_address_denies() {
        let sink = Arc::new(RecordingSink::default());
        let gate = gate(vec![entry("K", "0.0.0.0/0")], sink.clone());
        assert!(gate.check_ip(&ApiKey::new("K"), None).await.is_err());
        assert_eq!(*sink.0.lock().unwrap(), vec![(None, false)]);
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed_with_403() {
        for kind in [StoreErrorKind::Connection, StoreErrorKind::AdminShutdown] {
            let sink = Arc::new(RecordingSink::default());
            let gate = NetworkGate::new(Arc::new(DownStore(kind)), sink.clone());

            let err = gate
                .check_ip(&ApiKey::new("K"), ip("10.0.0.5"))
                .await
                .unwrap_err();
            assert_eq!(denial(err), (403, "IPNotAuthorizedForKey".to_string()));
            assert_eq!(*sink.0.lock().unwrap(), vec![(ip("10.0.0.5"), false)]);
        }
    }

    #[tokio::test]
    async fn test_gate_check_uses_request_fields() {
        let sink = Arc::new(RecordingSink::default());
        let gate = gate(vec![entry("K", "10.0.0.0/24")], sink);
        let request = GateRequest::new("K", "", ip("10.0.0.9"));
        assert!(gate.check(&request).await.is_ok());
        assert_eq!(gate.name(), "network");
    }
}
