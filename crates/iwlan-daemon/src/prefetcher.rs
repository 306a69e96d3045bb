//! Concrete [`EpdgPrefetcher`] wiring the Data/Network surface's DNS
//! prefetch to the real selector and resolver.

use std::net::IpAddr;

use async_trait::async_trait;
use iwlan_epdg_selector::{resolve, HickoryNetwork, SelectorConfig, SelectorContext};
use iwlan_surface::EpdgPrefetcher;
use iwlan_types::ProtocolFamily;
use tokio_util::sync::CancellationToken;

pub struct SelectorPrefetcher {
    config: SelectorConfig,
    context: SelectorContext,
    network: HickoryNetwork,
}

impl SelectorPrefetcher {
    pub fn new(config: SelectorConfig, context: SelectorContext, bind_addr: IpAddr) -> anyhow::Result<Self> {
        Ok(Self {
            config,
            context,
            network: HickoryNetwork::bound_to(bind_addr)?,
        })
    }
}

#[async_trait]
impl EpdgPrefetcher for SelectorPrefetcher {
    async fn prefetch(&self, is_roaming: bool) {
        let cancel = CancellationToken::new();

        if let Err(error) = resolve(
            &self.config,
            &self.context,
            ProtocolFamily::Ipv4v6,
            is_roaming,
            &self.network,
            &cancel,
        )
        .await
        {
            tracing::debug!(%error, is_roaming, "ePDG prefetch resolved nothing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_to_any_local_address() {
        let prefetcher = SelectorPrefetcher::new(
            SelectorConfig::default(),
            SelectorContext::default(),
            "0.0.0.0".parse().unwrap(),
        );

        assert!(prefetcher.is_ok());
    }
}
