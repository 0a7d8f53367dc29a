//! Trust-boundary gates.
//!
//! A gate either passes a request or fails it with a classified error.
//! Gates hold no per-request state; the only shared state is the injected
//! store or provider client.

mod api_key;
mod network;
mod token;

use std::net::IpAddr;

use async_trait::async_trait;

use tracegate_core::{ApiKey, Claims};

use crate::boundary::ApiError;

pub use api_key::ApiKeyGate;
pub use network::NetworkGate;
pub use token::{TokenError, TokenGate};

/// Request attributes the gates consult.
#[derive(Debug, Clone)]
pub struct GateRequest {
    /// Value of the `apiKey` header, empty when absent.
    pub api_key: ApiKey,
    /// Value of the `Authorization` header, empty when absent.
    pub authorization: String,
    /// Caller address, if it could be determined.
    pub client_ip: Option<IpAddr>,
}

impl GateRequest {
    /// Create a gate request.
    #[must_use]
    pub fn new(
        api_key: impl Into<ApiKey>,
        authorization: impl Into<String>,
        client_ip: Option<IpAddr>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            authorization: authorization.into(),
            client_ip,
        }
    }
}

/// Identity established for a request.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    /// Operator claims, when a token gate authenticated the caller.
    pub claims: Option<Claims>,
}

impl Identity {
    /// No operator identity.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self { claims: None }
    }

    /// Identity of an authenticated operator.
    #[must_use]
    pub const fn authenticated(claims: Claims) -> Self {
        Self {
            claims: Some(claims),
        }
    }

    /// Combine with the outcome of a later gate; later claims win.
    #[must_use]
    pub fn merge(self, later: Self) -> Self {
        Self {
            claims: later.claims.or(self.claims),
        }
    }

    /// Caller id rendered into error details.
    #[must_use]
    pub fn caller_id(&self) -> Option<String> {
        self.claims
            .as_ref()
            .map(|claims| claims.operator_id().to_string())
    }
}

/// One trust-boundary check.
#[async_trait]
pub trait Gate: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Pass or fail the request.
    async fn check(&self, request: &GateRequest) -> Result<Identity, ApiError>;
}
