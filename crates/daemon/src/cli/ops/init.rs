use std::path::PathBuf;

use clap::Args;

use vertex_daemon::state::{AppConfig, AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// IPFS (Kubo) binary to launch (default: ipfs on PATH)
    #[arg(long)]
    pub ipfs_bin: Option<PathBuf>,

    /// IPFS repo directory, exported to the daemon as IPFS_PATH
    #[arg(long)]
    pub repo_path: Option<PathBuf>,

    /// CID pinned at every startup (repeatable, replaces the Teia default)
    #[arg(long = "initial-pin")]
    pub initial_pins: Vec<String>,

    /// Abort startup if the bootstrap peer cannot be reached
    #[arg(long)]
    pub strict_bootstrap: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let defaults = AppConfig::default();
        let config = AppConfig {
            ipfs_bin: self.ipfs_bin.clone().unwrap_or(defaults.ipfs_bin.clone()),
            repo_path: self.repo_path.clone(),
            api_url: ctx
                .api_url
                .as_ref()
                .map(|url| url.to_string())
                .unwrap_or(defaults.api_url.clone()),
            initial_pins: if self.initial_pins.is_empty() {
                defaults.initial_pins.clone()
            } else {
                self.initial_pins.clone()
            },
            strict_bootstrap: self.strict_bootstrap,
            ..defaults
        };

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;

        let output = format!(
            "Initialized tz-vertex directory at: {}\n\
             - Config: {}\n\
             - Pin list: {}\n\
             - IPFS binary: {}\n\
             - API URL: {}\n\
             - Initial pins: {}",
            state.vertex_dir.display(),
            state.config_path.display(),
            state.pin_list_path.display(),
            state.config.ipfs_bin.display(),
            state.config.api_url,
            state.config.initial_pins.len(),
        );

        Ok(output)
    }
}
