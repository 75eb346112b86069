use clap::Args;

use crate::state::{AppConfig, AppState, StateError, DEFAULT_NODE};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Primary node address (URL or multiaddr)
    #[arg(long, default_value = DEFAULT_NODE)]
    pub url: String,

    /// Reader node or gateway address (defaults to --url)
    #[arg(long)]
    pub reader_url: Option<String>,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = StateError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut config = AppConfig::default();
        config.client.url = self.url.clone();
        config.client.reader_url = self.reader_url.clone().unwrap_or_else(|| self.url.clone());

        let state = AppState::init(ctx.config_path.clone(), config, self.force)?;

        Ok(format!(
            "Initialized config at {}\n  url:        {}\n  reader_url: {}",
            state.config_path.display(),
            state.config.client.url,
            state.config.client.reader_url
        ))
    }
}
