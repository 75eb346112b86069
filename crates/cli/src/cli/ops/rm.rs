use clap::Args;
use ipfs_client::prelude::{ContentId, RemoveOptions, RemoveReport, StepOutcome};

use crate::cli::op::ClientSetupError;

#[derive(Args, Debug, Clone)]
pub struct Rm {
    /// Content identifier to remove
    pub cid: ContentId,

    /// Leave the remote pinning service untouched
    #[arg(long)]
    pub skip_remote: bool,

    /// Leave the S3 copy in place
    #[arg(long)]
    pub skip_s3: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RmError {
    #[error(transparent)]
    Setup(#[from] ClientSetupError),
    #[error(transparent)]
    Client(#[from] ipfs_client::Error),
    #[error("removal incomplete\n{0}")]
    Incomplete(String),
}

fn outcome_line(backend: &str, outcome: &StepOutcome) -> String {
    match outcome {
        StepOutcome::Done => format!("  {:<11} removed", backend),
        StepOutcome::Skipped => format!("  {:<11} skipped", backend),
        StepOutcome::Failed(e) => format!("  {:<11} FAILED: {}", backend, e),
    }
}

fn summarize(report: &RemoveReport) -> String {
    [
        outcome_line("local:", &report.local),
        outcome_line("remote pin:", &report.remote_pin),
        outcome_line("s3:", &report.s3),
    ]
    .join("\n")
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Rm {
    type Error = RmError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let client = ctx.client()?;
        let options = RemoveOptions {
            skip_remote: self.skip_remote,
            skip_s3: self.skip_s3,
        };
        let report = client.remove(&self.cid, options).await?;
        client.close();

        let summary = summarize(&report);
        if !report.succeeded() {
            return Err(RmError::Incomplete(summary));
        }
        Ok(format!("Removed {}\n{}", self.cid, summary))
    }
}
