//! Status command - probe a local gateway's health endpoint.

use std::time::Duration;

use anyhow::Result;

use crate::ui;

/// Probe `http://127.0.0.1:<port>/health`.
pub async fn run_status(port: u16) -> Result<()> {
    ui::header("Gateway Status");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    match client
        .get(format!("http://127.0.0.1:{port}/health"))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            ui::success(&format!("Gateway is running on port {port}"));
            if let Ok(body) = resp.json::<serde_json::Value>().await {
                if let Some(version) = body.get("version").and_then(|v| v.as_str()) {
                    ui::kv("Version", version);
                }
                if let Some(status) = body.get("status").and_then(|v| v.as_str()) {
                    ui::kv("Status", status);
                }
            }
        }
        Ok(resp) => {
            ui::warning(&format!("Health check returned {}", resp.status()));
        }
        Err(e) => {
            tracing::debug!(error = %e, "Health probe failed");
            ui::warning(&format!("Gateway is not running on port {port}"));
            ui::info("Start with: tracegate serve");
        }
    }

    Ok(())
}
