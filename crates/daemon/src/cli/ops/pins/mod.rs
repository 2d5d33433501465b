use std::sync::Arc;

use clap::{Args, Subcommand};

pub mod add;
pub mod ls;
pub mod rm;

use crate::cli::op::{Op, OpContext};
use vertex_daemon::node::{ApiError, ControlApi, KuboClient};
use vertex_daemon::pins::{PinStore, PinStoreError, ReconcileJob, Reconciler};
use vertex_daemon::state::{AppState, StateError};

crate::command_enum! {
    (Ls, ls::Ls),
    (Add, add::Add),
    (Rm, rm::Rm),
}

// Rename the generated Command to PinsCommand for clarity
pub type PinsCommand = Command;

/// Inspect or edit the pin list without running the companion
#[derive(Args, Debug, Clone)]
pub struct Pins {
    #[command(subcommand)]
    pub command: PinsCommand,
}

#[async_trait::async_trait]
impl Op for Pins {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PinsError {
    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error(transparent)]
    Store(#[from] PinStoreError),

    #[error("api error: {0}")]
    Api(#[from] ApiError),
}

/// Load app state and the pin list it points at.
pub(crate) async fn open_store(ctx: &OpContext) -> Result<(AppState, PinStore), PinsError> {
    let state = ctx.state()?;
    let store = PinStore::new(&state.pin_list_path);
    store.load().await?;
    Ok((state, store))
}

/// Apply `job` against the configured node if one answers, and describe
/// what happened.
///
/// An unreachable node is not an error: the list is the source of truth and
/// `vertex run` re-pins everything in it at startup.
pub(crate) async fn reconcile_now(state: &AppState, job: ReconcileJob) -> Result<String, PinsError> {
    let config = state.to_companion_config()?;
    let client = KuboClient::new(&config.api_url)?;

    match client.identity_self().await {
        Ok(_) => {}
        Err(e) if e.is_unreachable() => {
            return Ok(format!(
                "IPFS node not reachable at {}, it will be reconciled on the next `vertex run`",
                config.api_url
            ));
        }
        Err(e) => return Err(e.into()),
    }

    let reconciler = Reconciler::new(Arc::new(client));
    let verb = match &job {
        ReconcileJob::Pin(_) => "pinned",
        ReconcileJob::Unpin(_) => "unpinned",
    };
    Ok(match reconciler.apply(&job).await {
        Ok(()) => format!("{} {} on the IPFS node", verb, job.id()),
        Err(e) => format!("warning: {}", e),
    })
}
