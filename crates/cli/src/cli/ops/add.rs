use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use ipfs_client::prelude::{AddReceipt, PinEvent};

use crate::cli::op::ClientSetupError;

#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct Add {
    /// File to add
    pub file: Option<PathBuf>,

    /// Inline JSON document to add
    #[arg(long)]
    pub json: Option<String>,

    /// Inline text to add
    #[arg(long)]
    pub text: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AddError {
    #[error(transparent)]
    Setup(#[from] ClientSetupError),
    #[error(transparent)]
    Client(#[from] ipfs_client::Error),
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// What was stored and which replicas fell short.
#[derive(Debug)]
pub struct AddOutput {
    pub receipt: AddReceipt,
    /// Outcome of a background pin, if it arrived before exit
    pub background: Option<PinEvent>,
}

impl fmt::Display for AddOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let receipt = &self.receipt;
        write!(f, "{}", receipt.cid)?;
        if let Some(status) = &receipt.remote_pin {
            write!(f, "\nremote pin: {} ({:?})", status.requestid, status.status)?;
        }
        match &self.background {
            Some(PinEvent::Pinned { request_id, .. }) => {
                write!(f, "\nremote pin: {} (background)", request_id)?
            }
            Some(PinEvent::Failed { reason, .. }) => {
                write!(f, "\nwarning: background remote pin: {}", reason)?
            }
            None if receipt.pin_backgrounded => {
                write!(f, "\nremote pin: requested in background")?
            }
            None => {}
        }
        for shortfall in &receipt.shortfalls {
            write!(f, "\nwarning: {}", shortfall)?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Add {
    type Error = AddError;
    type Output = AddOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let client = ctx.client()?;
        // the process exits right after, so wait for a background pin here
        let mut events = client.subscribe();

        let receipt = if let Some(path) = &self.file {
            let data = tokio::fs::read(path)
                .await
                .map_err(|e| AddError::Read(path.clone(), e))?;
            client.add_bytes(data).await?
        } else if let Some(json) = &self.json {
            let value: serde_json::Value = serde_json::from_str(json)?;
            client.add_json(&value).await?
        } else {
            client.add_str(self.text.as_deref().unwrap_or_default()).await?
        };

        let background = if receipt.pin_backgrounded {
            let wait = client.config().timeout() + Duration::from_secs(1);
            tokio::time::timeout(wait, events.recv()).await.ok().and_then(|r| r.ok())
        } else {
            None
        };

        client.close();
        Ok(AddOutput {
            receipt,
            background,
        })
    }
}
