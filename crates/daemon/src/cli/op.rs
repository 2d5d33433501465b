use std::error::Error;
use std::path::PathBuf;

use url::Url;

use vertex_daemon::state::{AppState, StateError};

#[derive(Clone, Debug)]
pub struct OpContext {
    /// Optional `--api-url` override for the config's api_url
    pub api_url: Option<Url>,
    /// Optional custom config path (defaults to ~/.tz-vertex)
    pub config_path: Option<PathBuf>,
}

impl OpContext {
    pub fn new(api_url: Option<Url>, config_path: Option<PathBuf>) -> Self {
        Self {
            api_url,
            config_path,
        }
    }

    /// Load app state with command-line overrides applied.
    pub fn state(&self) -> Result<AppState, StateError> {
        let mut state = AppState::load(self.config_path.clone())?;
        if let Some(url) = &self.api_url {
            state.config.api_url = url.to_string();
        }
        Ok(state)
    }
}

#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Output;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::cli::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::cli::op::Op>::Error),
            )*
        }

        #[async_trait::async_trait]
        impl $crate::cli::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            async fn execute(&self, ctx: &$crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => {
                            op.execute(ctx).await
                                .map(OpOutput::$variant)
                                .map_err(OpError::$variant)
                        },
                    )*
                }
            }
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        OpOutput::$variant(output) => write!(f, "{}", output),
                    )*
                }
            }
        }
    };
}
