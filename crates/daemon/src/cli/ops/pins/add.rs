use clap::Args;
use common::prelude::ContentId;

use vertex_daemon::pins::ReconcileJob;

use super::{open_store, reconcile_now, PinsError};

#[derive(Args, Debug, Clone)]
pub struct Add {
    /// CID or /ipfs/ path to keep pinned
    pub cid: String,

    /// Only edit the pin list, don't contact the IPFS node
    #[arg(long)]
    pub offline: bool,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Add {
    type Error = PinsError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (state, store) = open_store(ctx).await?;
        let cid = ContentId::canonicalize(&self.cid);
        let cid = cid.as_str();

        let mut lines = Vec::new();
        if store.add(cid).await? {
            lines.push(format!("added {} to {}", cid, store.path().display()));
        } else {
            lines.push(format!("{} is already in the pin list", cid));
        }

        if !self.offline {
            lines.push(reconcile_now(&state, ReconcileJob::Pin(cid.to_string())).await?);
        }
        Ok(lines.join("\n"))
    }
}
