//! Production [`Network`] backed by `hickory-resolver`, bound to a single
//! interface's local address so lookups traverse that network even when
//! the default route would pick another.

use std::net::{IpAddr, SocketAddr};

use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig};
use hickory_resolver::TokioResolver;

use crate::Network;

pub struct HickoryNetwork {
    resolver: TokioResolver,
}

impl HickoryNetwork {
    /// Builds a resolver whose outgoing queries are sourced from
    /// `bind_addr`, using the system's configured name servers.
    pub fn bound_to(bind_addr: IpAddr) -> anyhow::Result<Self> {
        let mut name_servers = NameServerConfigGroup::cloudflare();
        for server in name_servers.iter_mut() {
            server.bind_addr = Some(SocketAddr::new(bind_addr, 0));
        }

        let config = ResolverConfig::from_parts(None, Vec::new(), name_servers);
        let mut builder = TokioResolver::builder_with_config(
            config,
            hickory_resolver::name_server::TokioConnectionProvider::default(),
        );
        builder.options_mut().cache_size = 0;

        Ok(Self {
            resolver: builder.build(),
        })
    }
}

#[async_trait::async_trait]
impl Network for HickoryNetwork {
    async fn resolve_fqdn(&self, fqdn: &str) -> anyhow::Result<Vec<IpAddr>> {
        let lookup = self.resolver.lookup_ip(fqdn).await?;
        Ok(lookup.iter().collect())
    }
}
