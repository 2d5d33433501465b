use clap::Args;

use super::{open_store, PinsError};

#[derive(Args, Debug, Clone)]
pub struct Ls;

#[async_trait::async_trait]
impl crate::cli::op::Op for Ls {
    type Error = PinsError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (state, store) = open_store(ctx).await?;
        let pins = store.list().await;

        if pins.is_empty() {
            return Ok(format!(
                "pin list at {} is empty",
                state.pin_list_path.display()
            ));
        }
        Ok(pins.join("\n"))
    }
}
