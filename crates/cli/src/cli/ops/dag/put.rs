use std::path::PathBuf;

use clap::Args;

use crate::cli::op::ClientSetupError;

#[derive(Args, Debug, Clone)]
pub struct Put {
    /// File holding a dag-json document
    pub file: PathBuf,

    /// Store without pinning on the primary node
    #[arg(long)]
    pub no_pin: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DagPutError {
    #[error(transparent)]
    Setup(#[from] ClientSetupError),
    #[error(transparent)]
    Client(#[from] ipfs_client::Error),
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Put {
    type Error = DagPutError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let data = tokio::fs::read(&self.file)
            .await
            .map_err(|e| DagPutError::Read(self.file.clone(), e))?;

        let client = ctx.client()?;
        let receipt = client.dag_put(data, !self.no_pin).await?;
        client.close();

        let mut lines = vec![receipt.cid.to_string()];
        lines.extend(receipt.shortfalls.iter().map(|s| format!("warning: {}", s)));
        Ok(lines.join("\n"))
    }
}
