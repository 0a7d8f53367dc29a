//! Ordered gate composition.

use std::net::IpAddr;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::boundary::{ApiError, CallerId};
use crate::client_ip::{direct_ip, resolve_client_ip};
use crate::gates::{Gate, GateRequest, Identity};

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "apikey";

/// Gates a request must pass, in order.
///
/// The first failure short-circuits; later gates never run.
#[derive(Clone, Default)]
pub struct Pipeline {
    gates: Vec<Arc<dyn Gate>>,
    trusted_proxies: Arc<[IpAddr]>,
}

impl Pipeline {
    /// Empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a gate.
    #[must_use]
    pub fn with_gate(mut self, gate: Arc<dyn Gate>) -> Self {
        self.gates.push(gate);
        self
    }

    /// Proxies whose forwarding headers name the caller.
    #[must_use]
    pub fn with_trusted_proxies(mut self, proxies: &[IpAddr]) -> Self {
        self.trusted_proxies = proxies.into();
        self
    }

    /// Gate names in run order.
    #[must_use]
    pub fn gate_names(&self) -> Vec<&'static str> {
        self.gates.iter().map(|gate| gate.name()).collect()
    }

    /// Run every gate against `request`.
    ///
    /// # Errors
    ///
    /// Returns the first gate failure unchanged.
    pub async fn run(&self, request: &GateRequest) -> Result<Identity, ApiError> {
        let mut identity = Identity::anonymous();
        for gate in &self.gates {
            let outcome = gate.check(request).await.inspect_err(|e| {
                tracing::debug!(gate = gate.name(), error = %e, "Gate rejected request");
            })?;
            identity = identity.merge(outcome);
        }
        Ok(identity)
    }

    /// Collect the gate inputs from request headers and connection info.
    #[must_use]
    pub fn gate_request(&self, headers: &HeaderMap, direct: Option<IpAddr>) -> GateRequest {
        let api_key = header_str(headers, API_KEY_HEADER);
        let authorization = header_str(headers, AUTHORIZATION.as_str());
        let client_ip = resolve_client_ip(headers, direct, &self.trusted_proxies);
        GateRequest::new(api_key, authorization, client_ip)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("gates", &self.gate_names())
            .field("trusted_proxies", &self.trusted_proxies)
            .finish()
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Middleware running `pipeline` before the inner handler.
///
/// On success the established [`Identity`] is placed in the request
/// extensions and the caller id is attached to the response.
pub async fn enforce(
    State(pipeline): State<Pipeline>,
    mut request: Request,
    next: Next,
) -> Response {
    let direct = direct_ip(request.extensions());
    let gate_request = pipeline.gate_request(request.headers(), direct);

    let identity = match pipeline.run(&gate_request).await {
        Ok(identity) => identity,
        Err(err) => return err.into_response(),
    };

    let caller = identity.caller_id();
    request.extensions_mut().insert(identity);

    let mut response = next.run(request).await;
    if let Some(caller) = caller {
        response.extensions_mut().insert(CallerId(caller));
    }
    response
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;
    use tracegate_core::error::messages;
    use tracegate_core::{Claims, CustomError};

    use super::*;

    struct Counting {
        name: &'static str,
        calls: AtomicUsize,
        outcome: Result<Option<&'static str>, &'static str>,
    }

    impl Counting {
        fn new(
            name: &'static str,
            outcome: Result<Option<&'static str>, &'static str>,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: AtomicUsize::new(0),
                outcome,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Gate for Counting {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn check(&self, _request: &GateRequest) -> Result<Identity, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome {
                Ok(None) => Ok(Identity::anonymous()),
                Ok(Some(operator)) => {
                    let raw = json!({ "operator_id": operator });
                    let claims = Claims::from_raw(raw.as_object().cloned().unwrap()).unwrap();
                    Ok(Identity::authenticated(claims))
                }
                Err(message) => Err(CustomError::authorization(message).into()),
            }
        }
    }

    fn request() -> GateRequest {
        GateRequest::new("K1", "Bearer t", None)
    }

    #[tokio::test]
    async fn test_runs_gates_in_order() {
        let first = Counting::new("first", Ok(None));
        let second = Counting::new("second", Ok(Some("op-1")));
        let pipeline = Pipeline::new()
            .with_gate(first.clone())
            .with_gate(second.clone());

        assert_eq!(pipeline.gate_names(), vec!["first", "second"]);
        let identity = pipeline.run(&request()).await.unwrap();
        assert_eq!(identity.caller_id().as_deref(), Some("op-1"));
        assert_eq!((first.calls(), second.calls()), (1, 1));
    }

    #[tokio::test]
    async fn test_first_failure_short_circuits() {
        let first = Counting::new("first", Err(messages::INVALID_KEY));
        let second = Counting::new("second", Ok(Some("op-1")));
        let pipeline = Pipeline::new()
            .with_gate(first.clone())
            .with_gate(second.clone());

        let err = pipeline.run(&request()).await.unwrap_err();
        assert_eq!(err.classify().message, "InvalidKey");
        assert_eq!((first.calls(), second.calls()), (1, 0));
    }

    #[tokio::test]
    async fn test_empty_pipeline_passes_anonymously() {
        let identity = Pipeline::new().run(&request()).await.unwrap();
        assert!(identity.claims.is_none());
    }

    #[test]
    fn test_gate_request_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", "K1".parse().unwrap());
        headers.insert(AUTHORIZATION, "Bearer tok".parse().unwrap());

        let request = Pipeline::new().gate_request(&headers, Some("10.0.0.5".parse().unwrap()));
        assert!(request.api_key.matches("K1"));
        assert_eq!(request.authorization, "Bearer tok");
        assert_eq!(request.client_ip, Some("10.0.0.5".parse().unwrap()));

        let request = Pipeline::new().gate_request(&HeaderMap::new(), None);
        assert!(request.api_key.is_empty());
        assert!(request.authorization.is_empty());
        assert!(request.client_ip.is_none());
    }
}
