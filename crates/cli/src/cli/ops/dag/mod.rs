use clap::{Args, Subcommand};

pub mod get;
pub mod put;

use crate::cli::op::Op;

crate::command_enum! {
    (Put, put::Put),
    (Get, get::Get),
}

pub type DagCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct Dag {
    #[command(subcommand)]
    pub command: DagCommand,
}

#[async_trait::async_trait]
impl Op for Dag {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}
