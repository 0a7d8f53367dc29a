//! Serve command - start the gateway server.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracegate_core::{Config, MemoryCredentialStore, TracingAuditSink};
use tracegate_gateway::Gateway;
use tracegate_identity::HttpIdentityProvider;

use crate::ui;

/// Serve command arguments.
#[derive(Debug, Clone, Default)]
pub struct ServeArgs {
    /// Port override.
    pub port: Option<u16>,
    /// Bind address override.
    pub bind: Option<String>,
}

/// Start the gateway and run until Ctrl-C.
pub async fn run_serve(mut config: Config, args: ServeArgs) -> Result<()> {
    if let Some(port) = args.port {
        config.gateway.port = port;
    }
    if let Some(bind) = args.bind {
        config.gateway.bind_address = bind;
    }
    config.validate()?;

    let store = match &config.store.reference_data_path {
        Some(path) => MemoryCredentialStore::from_file(path)
            .with_context(|| format!("Failed to load reference data from {}", path.display()))?,
        None => {
            ui::warning("No reference data configured; every API key will be rejected");
            MemoryCredentialStore::default()
        }
    };

    let provider = HttpIdentityProvider::from_config(&config.identity)
        .context("Failed to create identity provider")?;

    ui::header("Starting Tracegate Gateway");
    ui::kv(
        "Address",
        &format!("{}:{}", config.gateway.bind_address, config.gateway.port),
    );
    ui::kv(
        "IP restriction",
        if config.security.ip_restriction_enabled {
            "enabled"
        } else {
            "disabled"
        },
    );
    ui::kv(
        "Token verification",
        if config.identity.shared_secret.is_some() {
            "shared secret (HS256)"
        } else {
            "JWKS (RS256)"
        },
    );
    println!();
    ui::info("Press Ctrl+C to stop");

    let gateway = Gateway::builder()
        .with_config(config)
        .with_store(Arc::new(store))
        .with_provider(Arc::new(provider))
        .with_audit_sink(Arc::new(TracingAuditSink))
        .build()?;

    gateway.run().await?;
    ui::success("Gateway stopped");

    Ok(())
}
