use clap::Args;

use vertex_daemon::node::{ControlApi, KuboClient};
use vertex_daemon::pins::PinStore;

#[derive(Args, Debug, Clone)]
pub struct Health;

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("Health check failed: {0}")]
    Failed(String),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Health {
    type Error = HealthError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut lines = Vec::new();

        // 1. Config and pin list
        lines.push("Config:".to_string());
        let state = match ctx.state() {
            Ok(state) => state,
            Err(e) => {
                lines.push(format!("  error: {}", e));
                return Ok(lines.join("\n"));
            }
        };
        lines.push(format!("  directory:   {}", state.vertex_dir.display()));
        if state.config_path.exists() {
            lines.push("  config.toml: OK".to_string());
        } else {
            lines.push("  config.toml: missing (using defaults)".to_string());
        }

        let config = match state.to_companion_config() {
            Ok(config) => config,
            Err(e) => {
                lines.push(format!("  error: {}", e));
                return Ok(lines.join("\n"));
            }
        };
        lines.push(format!("  bootstrap:   {}", config.bootstrap_peer));

        let store = PinStore::new(&config.pin_list_path);
        match store.load().await {
            Ok(count) => lines.push(format!(
                "  pin list:    {} ({} pins)",
                config.pin_list_path.display(),
                count
            )),
            Err(e) => lines.push(format!("  pin list:    {}", e)),
        }

        // 2. Node reachability
        lines.push(String::new());
        lines.push(format!("IPFS node ({}):", config.api_url));

        let client =
            KuboClient::new(&config.api_url).map_err(|e| HealthError::Failed(e.to_string()))?;
        match client.identity_self().await {
            Ok(identity) => {
                lines.push("  api:     OK".to_string());
                lines.push(format!("  peer id: {}", identity.id));
                lines.push(format!("  agent:   {}", identity.agent_version));
            }
            Err(e) if e.is_unreachable() => {
                lines.push("  api:     NOT REACHABLE".to_string());
            }
            Err(e) => {
                lines.push(format!("  api:     UNHEALTHY ({})", e));
            }
        }

        Ok(lines.join("\n"))
    }
}
