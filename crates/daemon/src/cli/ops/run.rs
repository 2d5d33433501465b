use clap::Args;

use vertex_daemon::process::{init_logging, run, RunError};
use vertex_daemon::state::StateError;

#[derive(Args, Debug, Clone)]
pub struct Run {
    /// Directory for log files (logs to stdout only if not set)
    #[arg(long)]
    pub log_dir: Option<std::path::PathBuf>,

    /// Default log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    /// Don't read commands from stdin, run until SIGINT or SIGTERM
    #[arg(long)]
    pub headless: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RunOpError {
    #[error("state error: {0}")]
    StateError(#[from] StateError),

    #[error(transparent)]
    Run(#[from] RunError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Run {
    type Error = RunOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.state()?;
        let config = state.to_companion_config()?;

        let _guards = init_logging(self.log_level, self.log_dir.as_deref());
        tracing::info!("using config directory {}", state.vertex_dir.display());

        run(&config, !self.headless).await?;
        Ok("tz-vertex stopped".to_string())
    }
}
