use clap::Args;
use ipfs_client::prelude::ContentId;

use crate::cli::op::ClientSetupError;

#[derive(Args, Debug, Clone)]
pub struct Pinned {
    /// Content identifier to check on the primary node
    pub cid: ContentId,
}

#[derive(Debug, thiserror::Error)]
pub enum PinnedError {
    #[error(transparent)]
    Setup(#[from] ClientSetupError),
    #[error(transparent)]
    Client(#[from] ipfs_client::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Pinned {
    type Error = PinnedError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let client = ctx.client()?;
        let pinned = client.is_pinned(&self.cid).await?;
        client.close();

        if pinned {
            Ok(format!("{} is pinned", self.cid))
        } else {
            Ok(format!("{} is not pinned", self.cid))
        }
    }
}
