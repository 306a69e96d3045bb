//! Resolves a carrier's priority-ordered ePDG address sources into a
//! protocol-filtered, deduplicated endpoint list.

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod hickory_network;
mod plmn;

pub use hickory_network::HickoryNetwork;
pub use plmn::PlmnId;

use std::collections::HashSet;
use std::net::IpAddr;

use iwlan_types::{EndpointSource, EpdgEndpoint, GenericError, ProtocolFamily};
use tokio_util::sync::CancellationToken;

/// A DNS lookup bound to a specific network interface, so that lookups
/// traverse the correct network even when the default route would pick
/// another. Implemented for production by a
/// `hickory-resolver` instance configured to bind that interface; tests
/// supply a fake.
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    async fn resolve_fqdn(&self, fqdn: &str) -> anyhow::Result<Vec<IpAddr>>;
}

/// Literal address or FQDN configured for the `STATIC` source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaticAddress {
    Literal(IpAddr),
    Fqdn(String),
}

/// Per-slot carrier configuration driving the selector.
#[derive(Debug, Clone, Default)]
pub struct SelectorConfig {
    pub home_priority: Vec<EndpointSource>,
    pub roaming_priority: Vec<EndpointSource>,
    pub static_address: Option<StaticAddress>,
    /// Extra MCC-MNC pairs configured alongside the SIM's own PLMN, each
    /// contributing its own FQDN (`PLMN`).
    pub additional_plmns: Vec<PlmnId>,
}

impl SelectorConfig {
    fn priority(&self, is_roaming: bool) -> &[EndpointSource] {
        if is_roaming {
            &self.roaming_priority
        } else {
            &self.home_priority
        }
    }
}

/// Context supplied at resolution time: SIM/cell state the carrier config
/// alone doesn't carry.
#[derive(Debug, Clone, Default)]
pub struct SelectorContext {
    pub home_plmn: Option<PlmnId>,
    /// Addresses carried out-of-band from the cellular attach (`PCO`).
    pub pco_addresses: Vec<IpAddr>,
    /// FQDNs derived from the current tracking-area identity
    /// (`CELLULAR_LOC`).
    pub tracking_area_fqdns: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SelectorError {
    #[error(transparent)]
    ServerSelectionFailed(#[from] ServerSelectionFailed),
}

#[derive(Debug, thiserror::Error)]
#[error("no ePDG address source produced a usable endpoint")]
pub struct ServerSelectionFailed;

/// Resolves the ordered endpoint list for `protocol_filter`, walking the
/// carrier's priority array and stopping early if `cancel` fires at a
/// source boundary.
pub async fn resolve(
    config: &SelectorConfig,
    context: &SelectorContext,
    protocol_filter: ProtocolFamily,
    is_roaming: bool,
    network: &dyn Network,
    cancel: &CancellationToken,
) -> Result<Vec<EpdgEndpoint>, SelectorError> {
    let mut endpoints = Vec::new();
    let mut seen = HashSet::new();

    for source in config.priority(is_roaming) {
        if cancel.is_cancelled() {
            // A caller that cancelled mid-walk still gets whatever the
            // earlier sources already produced, rather than nothing.
            return Ok(endpoints);
        }

        let addresses = match source {
            EndpointSource::Static => resolve_static(config.static_address.as_ref(), network).await,
            EndpointSource::Plmn => resolve_plmn(context, &config.additional_plmns, network).await,
            EndpointSource::Pco => context.pco_addresses.clone(),
            EndpointSource::CellularLoc => resolve_cellular_loc(context, network).await,
        };

        for address in addresses {
            if !protocol_filter.accepts(address) {
                continue;
            }
            if seen.insert(address) {
                endpoints.push(EpdgEndpoint::new(address, *source));
            }
        }
    }

    if endpoints.is_empty() {
        return Err(ServerSelectionFailed.into());
    }

    Ok(endpoints)
}

async fn resolve_static(address: Option<&StaticAddress>, network: &dyn Network) -> Vec<IpAddr> {
    match address {
        Some(StaticAddress::Literal(ip)) => vec![*ip],
        Some(StaticAddress::Fqdn(fqdn)) => lookup(network, fqdn).await,
        None => Vec::new(),
    }
}

async fn resolve_plmn(
    context: &SelectorContext,
    additional: &[PlmnId],
    network: &dyn Network,
) -> Vec<IpAddr> {
    let mut addresses = Vec::new();

    for plmn in context.home_plmn.iter().chain(additional.iter()) {
        addresses.extend(lookup(network, &plmn.epdg_fqdn()).await);
    }

    addresses
}

async fn resolve_cellular_loc(context: &SelectorContext, network: &dyn Network) -> Vec<IpAddr> {
    let mut addresses = Vec::new();

    for fqdn in &context.tracking_area_fqdns {
        addresses.extend(lookup(network, fqdn).await);
    }

    addresses
}

async fn lookup(network: &dyn Network, fqdn: &str) -> Vec<IpAddr> {
    match network.resolve_fqdn(fqdn).await {
        Ok(addresses) => addresses,
        Err(error) => {
            tracing::debug!(%fqdn, %error, "DNS resolution failed for ePDG candidate");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeNetwork {
        answers: Mutex<HashMap<String, Vec<IpAddr>>>,
    }

    impl FakeNetwork {
        fn with(fqdn: &str, addresses: Vec<IpAddr>) -> Self {
            let network = Self::default();
            network.answers.lock().unwrap().insert(fqdn.to_string(), addresses);
            network
        }
    }

    #[async_trait::async_trait]
    impl Network for FakeNetwork {
        async fn resolve_fqdn(&self, fqdn: &str) -> anyhow::Result<Vec<IpAddr>> {
            Ok(self.answers.lock().unwrap().get(fqdn).cloned().unwrap_or_default())
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn static_literal_and_plmn_are_concatenated_in_priority_order() {
        let plmn = PlmnId::new("310", "41");
        let network = FakeNetwork::with(&plmn.epdg_fqdn(), vec![ip("203.0.113.9")]);

        let config = SelectorConfig {
            home_priority: vec![EndpointSource::Static, EndpointSource::Plmn],
            static_address: Some(StaticAddress::Literal(ip("198.51.100.1"))),
            ..Default::default()
        };
        let context = SelectorContext {
            home_plmn: Some(plmn),
            ..Default::default()
        };

        let endpoints = resolve(
            &config,
            &context,
            ProtocolFamily::Ipv4,
            false,
            &network,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(
            endpoints,
            vec![
                EpdgEndpoint::new(ip("198.51.100.1"), EndpointSource::Static),
                EpdgEndpoint::new(ip("203.0.113.9"), EndpointSource::Plmn),
            ]
        );
    }

    #[tokio::test]
    async fn protocol_filter_drops_mismatched_family() {
        let network = FakeNetwork::default();
        let config = SelectorConfig {
            home_priority: vec![EndpointSource::Static],
            static_address: Some(StaticAddress::Literal(ip("2001:db8::1"))),
            ..Default::default()
        };

        let result = resolve(
            &config,
            &SelectorContext::default(),
            ProtocolFamily::Ipv4,
            false,
            &network,
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(SelectorError::ServerSelectionFailed(_))));
    }

    #[tokio::test]
    async fn duplicate_addresses_across_sources_are_deduplicated() {
        let plmn = PlmnId::new("310", "41");
        let shared = ip("203.0.113.9");
        let network = FakeNetwork::with(&plmn.epdg_fqdn(), vec![shared]);

        let config = SelectorConfig {
            home_priority: vec![EndpointSource::Static, EndpointSource::Plmn],
            static_address: Some(StaticAddress::Literal(shared)),
            ..Default::default()
        };
        let context = SelectorContext {
            home_plmn: Some(plmn),
            ..Default::default()
        };

        let endpoints = resolve(
            &config,
            &context,
            ProtocolFamily::Ipv4,
            false,
            &network,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].source, EndpointSource::Static);
    }

    #[tokio::test]
    async fn cancellation_returns_whatever_was_resolved_before_it_fired() {
        let plmn = PlmnId::new("310", "41");
        let network = FakeNetwork::with(&plmn.epdg_fqdn(), vec![ip("203.0.113.9")]);
        let config = SelectorConfig {
            home_priority: vec![EndpointSource::Static, EndpointSource::Plmn],
            static_address: Some(StaticAddress::Literal(ip("198.51.100.1"))),
            ..Default::default()
        };
        let context = SelectorContext {
            home_plmn: Some(plmn),
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let endpoints = resolve(
            &config,
            &context,
            ProtocolFamily::Ipv4v6,
            false,
            &network,
            &cancel,
        )
        .await
        .unwrap();

        assert!(endpoints.is_empty(), "cancelled before the first source boundary, nothing resolved yet");
    }

    #[tokio::test]
    async fn all_sources_empty_fails_with_server_selection_failed() {
        let network = FakeNetwork::default();
        let config = SelectorConfig::default();

        let result = resolve(
            &config,
            &SelectorContext::default(),
            ProtocolFamily::Ipv4v6,
            false,
            &network,
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(SelectorError::ServerSelectionFailed(_))));
        // Confirm the error maps onto the shared generic-error vocabulary
        // used by the rest of the system.
        let _ = GenericError::ServerSelectionFailed;
    }
}
