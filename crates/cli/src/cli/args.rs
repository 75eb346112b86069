pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "jax-ipfs")]
#[command(about = "Add, fetch and remove IPFS content with remote pinning and S3 replication")]
pub struct Args {
    /// Path to the config file (defaults to ~/.jax-ipfs/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Default log level; RUST_LOG overrides it
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: crate::Command,
}
