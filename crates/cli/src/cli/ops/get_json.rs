use clap::Args;
use ipfs_client::prelude::ContentId;

use crate::cli::op::ClientSetupError;

#[derive(Args, Debug, Clone)]
pub struct GetJson {
    /// Content identifier of a JSON document
    pub cid: ContentId,
}

#[derive(Debug, thiserror::Error)]
pub enum GetJsonError {
    #[error(transparent)]
    Setup(#[from] ClientSetupError),
    #[error(transparent)]
    Client(#[from] ipfs_client::Error),
    #[error("failed to format JSON: {0}")]
    Format(#[from] serde_json::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for GetJson {
    type Error = GetJsonError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let client = ctx.client()?;
        let value: serde_json::Value = client.get_json(&self.cid).await?;
        client.close();
        Ok(serde_json::to_string_pretty(&value)?)
    }
}
