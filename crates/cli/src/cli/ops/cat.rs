use clap::Args;
use ipfs_client::prelude::ContentId;

use crate::cli::op::ClientSetupError;

#[derive(Args, Debug, Clone)]
pub struct Cat {
    /// Content identifier to read
    pub cid: ContentId,
}

#[derive(Debug, thiserror::Error)]
pub enum CatError {
    #[error(transparent)]
    Setup(#[from] ClientSetupError),
    #[error(transparent)]
    Client(#[from] ipfs_client::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Cat {
    type Error = CatError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let client = ctx.client()?;
        let bytes = client.cat(&self.cid).await?;
        client.close();

        // Try to convert to UTF-8 string, or show hex if binary
        match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Ok(text),
            Err(_) => {
                let hex = bytes
                    .iter()
                    .map(|b| format!("{:02x}", b))
                    .collect::<Vec<_>>()
                    .join(" ");
                Ok(format!("Binary content ({} bytes, hex): {}", bytes.len(), hex))
            }
        }
    }
}
