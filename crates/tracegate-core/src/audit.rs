//! Audit trail for network checks.

use std::net::IpAddr;

use chrono::{DateTime, Utc};

use crate::secrets::ApiKey;

/// One network-gate decision.
#[derive(Debug, Clone)]
pub struct IpCheckRecord {
    /// Key the caller presented.
    pub key: ApiKey,
    /// Caller address, if one could be determined.
    pub ip: Option<IpAddr>,
    /// Whether the caller was admitted.
    pub success: bool,
    /// When the decision was made.
    pub at: DateTime<Utc>,
}

impl IpCheckRecord {
    /// Create a record stamped now.
    #[must_use]
    pub fn new(key: ApiKey, ip: Option<IpAddr>, success: bool) -> Self {
        Self {
            key,
            ip,
            success,
            at: Utc::now(),
        }
    }
}

/// Receives audit records. Writes are side effects and never fail the caller.
pub trait AuditSink: Send + Sync {
    /// Record a network-gate decision.
    fn record_ip_check(&self, record: &IpCheckRecord);
}

/// Audit sink that emits structured events on the `tracegate::audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record_ip_check(&self, record: &IpCheckRecord) {
        let ip = record
            .ip
            .map_or_else(|| "unknown".to_string(), |ip| ip.to_string());
        tracing::info!(
            target: "tracegate::audit",
            key = %record.key.fingerprint(),
            ip = %ip,
            success = record.success,
            at = %record.at.to_rfc3339(),
            "ip check"
        );
    }
}
