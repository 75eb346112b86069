use clap::Args;
use ipfs_client::prelude::ContentId;

use crate::cli::op::ClientSetupError;

#[derive(Args, Debug, Clone)]
pub struct Get {
    /// Content identifier of the DAG node
    pub cid: ContentId,
}

#[derive(Debug, thiserror::Error)]
pub enum DagGetError {
    #[error(transparent)]
    Setup(#[from] ClientSetupError),
    #[error(transparent)]
    Client(#[from] ipfs_client::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Get {
    type Error = DagGetError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let client = ctx.client()?;
        let block = client.dag_get(&self.cid).await?;
        client.close();
        Ok(block.to_string())
    }
}
