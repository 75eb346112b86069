use clap::Args;
use ipfs_client::prelude::{AddressError, NodeAddress};

#[derive(Args, Debug, Clone)]
pub struct Resolve {
    /// Node address, e.g. /ip4/127.0.0.1/tcp/5001/http
    pub address: String,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Resolve {
    type Error = AddressError;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let address = NodeAddress::parse(&self.address)?;
        let base = address.resolve();
        let kind = if address.is_multiaddr() { "multiaddr" } else { "url" };
        Ok(format!("{} ({})", base, kind))
    }
}
