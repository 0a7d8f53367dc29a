//! Config show/validate commands.

use std::path::Path;

use anyhow::Result;
use serde_json::Value;
use tracegate_core::Config;

use crate::ui;

const SECRET_FIELDS: [&str; 3] = ["apiKey", "sharedSecret", "adminToken"];

/// Print the effective configuration as JSON with identity secrets redacted.
pub fn show(config: &Config) -> Result<()> {
    let value = redacted(config)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Load a configuration file, apply environment overrides and validate it.
pub fn validate(path: Option<&Path>) -> Result<()> {
    let path = path.map_or_else(Config::default_path, Path::to_path_buf);
    if !path.exists() {
        ui::info(&format!(
            "No config file at {}, defaults apply",
            path.display()
        ));
        return Ok(());
    }

    match Config::resolve(Some(&path), |name| std::env::var(name).ok()) {
        Ok(config) => {
            ui::success(&format!("Configuration is valid: {}", path.display()));
            ui::kv("Port", &config.gateway.port.to_string());
            ui::kv(
                "IP restriction",
                &config.security.ip_restriction_enabled.to_string(),
            );
            Ok(())
        }
        Err(e) => {
            ui::error(&format!("Invalid configuration: {e}"));
            Err(e.into())
        }
    }
}

fn redacted(config: &Config) -> Result<Value> {
    let mut value = serde_json::to_value(config)?;
    if let Some(identity) = value.get_mut("identity").and_then(Value::as_object_mut) {
        for field in SECRET_FIELDS {
            if let Some(secret) = identity.get_mut(field) {
                if !secret.is_null() {
                    *secret = Value::String("[REDACTED]".to_string());
                }
            }
        }
    }
    Ok(value)
}
