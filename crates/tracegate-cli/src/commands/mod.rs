//! CLI command implementations.

pub mod config;
pub mod serve;
pub mod status;

use std::path::Path;

use anyhow::{Context, Result};
use tracegate_core::Config;

pub use serve::run_serve;
pub use status::run_status;

/// Load configuration from `path` or the default location, apply
/// environment overrides, then validate.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    Config::resolve(path, |name| std::env::var(name).ok()).with_context(|| match path {
        Some(path) => format!("Failed to load config from {}", path.display()),
        None => "Failed to load default config".to_string(),
    })
}
