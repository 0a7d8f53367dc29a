//! Gateway server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use tracegate_core::{
    AuditSink, Config, CredentialStore, IdentityProvider, TracingAuditSink,
};

use crate::GatewayError;
use crate::boundary::{ApiError, error_boundary};
use crate::gates::{ApiKeyGate, Gate, NetworkGate, TokenGate};
use crate::pipeline::{Pipeline, enforce};
use crate::routes::{self, auth, system_auth};
use crate::usecase::CredentialUsecase;

/// State shared by the gateway's own handlers.
pub struct GatewayState {
    /// Credential flows.
    pub usecase: CredentialUsecase,
    /// Token verification.
    pub tokens: Arc<TokenGate>,
    /// Key check admitting any registered key.
    pub api_keys: Arc<ApiKeyGate>,
    /// Source-network check.
    pub network: Arc<NetworkGate>,
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState").finish_non_exhaustive()
    }
}

/// Gateway server.
pub struct Gateway {
    config: Config,
    state: Arc<GatewayState>,
    system_keys: Arc<ApiKeyGate>,
    protected: Option<Router>,
}

/// Builder for constructing a Gateway with its dependencies.
pub struct GatewayBuilder {
    config: Config,
    store: Option<Arc<dyn CredentialStore>>,
    provider: Option<Arc<dyn IdentityProvider>>,
    audit: Arc<dyn AuditSink>,
    protected: Option<Router>,
}

impl GatewayBuilder {
    /// Create a new builder with default config.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            store: None,
            provider: None,
            audit: Arc::new(TracingAuditSink),
            protected: None,
        }
    }

    /// Set configuration.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the credential store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the identity provider.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the audit sink for network checks.
    #[must_use]
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Mount business routes behind the full gate pipeline.
    ///
    /// Handlers obtain the caller with [`crate::Authenticated`]. The router
    /// must define at least one route.
    #[must_use]
    pub fn with_protected_routes(mut self, router: Router) -> Self {
        self.protected = Some(match self.protected.take() {
            Some(existing) => existing.merge(router),
            None => router,
        });
        self
    }

    /// Build the gateway.
    ///
    /// # Errors
    ///
    /// Returns error if the store or provider is missing or the
    /// configuration is invalid.
    pub fn build(self) -> Result<Gateway, GatewayError> {
        let store = self
            .store
            .ok_or_else(|| GatewayError::Config("Credential store is required".to_string()))?;
        let provider = self
            .provider
            .ok_or_else(|| GatewayError::Config("Identity provider is required".to_string()))?;

        if self.config.security.system_key_attributes.is_empty() {
            return Err(GatewayError::Config(
                "security.systemKeyAttributes cannot be empty".to_string(),
            ));
        }

        let api_keys = ApiKeyGate::new(store.clone())
            .with_span(tracing::info_span!("gate", name = "api_key"));
        let system_keys = ApiKeyGate::scoped(store.clone(), self.config.security.system_scope())
            .with_span(tracing::info_span!("gate", name = "system_api_key"));
        let network = NetworkGate::new(store, self.audit)
            .with_span(tracing::info_span!("gate", name = "network"));
        let tokens = TokenGate::new(provider.clone())
            .with_span(tracing::info_span!("gate", name = "token"));
        let usecase = CredentialUsecase::new(provider)
            .with_span(tracing::info_span!("usecase", name = "credentials"));

        let state = GatewayState {
            usecase,
            tokens: Arc::new(tokens),
            api_keys: Arc::new(api_keys),
            network: Arc::new(network),
        };

        Ok(Gateway {
            config: self.config,
            state: Arc::new(state),
            system_keys: Arc::new(system_keys),
            protected: self.protected,
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Gateway {
    /// Start building a gateway.
    #[must_use]
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Shared handler state.
    #[must_use]
    pub fn state(&self) -> Arc<GatewayState> {
        self.state.clone()
    }

    /// Key gate, then the network gate when IP restriction is enabled,
    /// then the token gate if `with_token`.
    #[must_use]
    pub fn pipeline(&self, with_token: bool) -> Pipeline {
        let mut pipeline = Pipeline::new()
            .with_trusted_proxies(&self.config.gateway.trusted_proxies)
            .with_gate(self.state.api_keys.clone());
        if self.config.security.ip_restriction_enabled {
            pipeline = pipeline.with_gate(self.state.network.clone());
        }
        if with_token {
            pipeline = pipeline.with_gate(self.state.tokens.clone());
        }
        pipeline
    }

    /// Pipeline for system endpoints: the attribute-scoped key gate only.
    #[must_use]
    pub fn system_pipeline(&self) -> Pipeline {
        let gate: Arc<dyn Gate> = self.system_keys.clone();
        Pipeline::new()
            .with_trusted_proxies(&self.config.gateway.trusted_proxies)
            .with_gate(gate)
    }

    /// The complete application router.
    #[must_use]
    pub fn router(&self) -> Router {
        let key_only = self.pipeline(false);
        let with_token = self.pipeline(true);

        tracing::debug!(
            key_only = ?key_only.gate_names(),
            with_token = ?with_token.gate_names(),
            "Gate pipelines"
        );

        let credentials = Router::new()
            .route("/auth/login", post(auth::login))
            .route("/auth/refresh", post(auth::refresh))
            .route_layer(middleware::from_fn_with_state(key_only, enforce));

        let password = Router::new()
            .route("/auth/change", post(auth::change_password))
            .route_layer(middleware::from_fn_with_state(with_token.clone(), enforce));

        let system = Router::new()
            .route("/systemAuth/token", post(system_auth::token))
            .route("/systemAuth/apiKey", post(system_auth::api_key))
            .route_layer(middleware::from_fn_with_state(
                self.system_pipeline(),
                enforce,
            ));

        let mut app = Router::new()
            .route("/health", get(routes::health))
            .merge(credentials)
            .merge(password)
            .merge(system)
            .with_state(self.state.clone());

        if let Some(protected) = &self.protected {
            app = app.merge(
                protected
                    .clone()
                    .route_layer(middleware::from_fn_with_state(with_token, enforce)),
            );
        }

        // Unmatched methods on known paths read as unknown endpoints.
        app.method_not_allowed_fallback(route_not_found)
            .fallback(route_not_found)
            .layer(middleware::from_fn(error_boundary))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the gateway server until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns error if the address is invalid or the server fails.
    pub async fn run(&self) -> Result<(), GatewayError> {
        let addr: SocketAddr = format!(
            "{}:{}",
            self.config.gateway.bind_address, self.config.gateway.port
        )
        .parse()
        .map_err(|e| GatewayError::Config(format!("Invalid address: {e}")))?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(
            ip_restriction = self.config.security.ip_restriction_enabled,
            "Gateway listening on http://{}",
            addr
        );

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| GatewayError::Server(e.to_string()))?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("port", &self.config.gateway.port)
            .field(
                "ip_restriction_enabled",
                &self.config.security.ip_restriction_enabled,
            )
            .finish_non_exhaustive()
    }
}

async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
    }
}
